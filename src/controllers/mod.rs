pub mod springboot_controller;
