use oerpfs_config::{MountConfig, Secret};

pub fn run(config: &MountConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render(config)?);
    Ok(())
}

/// The configuration as YAML, password masked.
fn render(config: &MountConfig) -> Result<String, serde_yaml::Error> {
    let mut shown = config.clone();
    if !shown.password.expose().is_empty() {
        shown.password = Secret::new("***");
    }
    serde_yaml::to_string(&shown)
}
