use super::{interrupted, service_for};
use clusterflow_core::{ClusterSpec, ClusterState, ClusterStateStore, cancellable};
use colored::Colorize;

pub async fn handle(spec: &ClusterSpec) -> anyhow::Result<()> {
    let service = service_for(spec)?;

    let store = ClusterStateStore::in_home_dir()?;
    let lock = store.acquire_lock(spec.cluster_name()).await?;

    println!(
        "{} {} cluster {}",
        "Launching".green(),
        service.name(),
        spec.cluster_name().cyan()
    );
    for template in spec.instance_templates() {
        println!("  {}", template);
    }

    let cluster = cancellable(service.launch_cluster(spec), interrupted()).await?;

    store
        .save(&ClusterState::new(
            spec.service_name(),
            spec.cluster_name(),
            cluster.clone(),
        ))
        .await?;
    lock.release().await?;

    println!();
    println!("{} {} instance(s)", "Launched".green(), cluster.len());
    for instance in cluster.instances() {
        let roles: Vec<&str> = instance.roles().iter().map(String::as_str).collect();
        println!(
            "  {}\t{}\t{}\t{}",
            instance.id(),
            roles.join("+"),
            instance
                .public_address()
                .map(|a| a.to_string())
                .unwrap_or_default(),
            instance
                .private_address()
                .map(|a| a.to_string())
                .unwrap_or_default(),
        );
    }
    Ok(())
}
