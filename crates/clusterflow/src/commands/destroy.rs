use super::{interrupted, service_for};
use clusterflow_core::{ClusterSpec, ClusterState, ClusterStateStore, cancellable};
use colored::Colorize;

pub async fn handle(spec: &ClusterSpec) -> anyhow::Result<()> {
    let service = service_for(spec)?;

    let store = ClusterStateStore::in_home_dir()?;
    let lock = store.acquire_lock(spec.cluster_name()).await?;

    println!(
        "{} {} cluster {}",
        "Destroying".yellow(),
        service.name(),
        spec.cluster_name().cyan()
    );

    // A corrupt record must not block tearing the cluster down
    match store.load(spec.cluster_name()).await {
        Ok(Some(state)) => println!("  {}", recorded_summary(&state)),
        Ok(None) => println!(
            "  {} no launch recorded for {}; destroying the nodes the provider lists",
            "Warning:".yellow(),
            spec.cluster_name()
        ),
        Err(e) => tracing::warn!("Could not read state for {}: {}", spec.cluster_name(), e),
    }

    cancellable(service.destroy_cluster(spec), interrupted()).await?;

    store.remove(spec.cluster_name()).await?;
    lock.release().await?;

    println!("{} cluster {}", "Destroyed".green(), spec.cluster_name());
    Ok(())
}

/// One line describing the recorded launch of a cluster
fn recorded_summary(state: &ClusterState) -> String {
    format!(
        "recorded {} cluster with {} instance(s), last updated {}",
        state.service_name,
        state.cluster.len(),
        state.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )
}
