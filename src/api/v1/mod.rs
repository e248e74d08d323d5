pub mod springboot;
