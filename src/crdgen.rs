use controller::api::v1::springboot::SpringBoot;
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&SpringBoot::crd())?);
    Ok(())
}
