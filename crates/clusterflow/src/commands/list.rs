use super::{interrupted, service_for};
use clusterflow_core::{ClusterSpec, NodeMetadata, cancellable};

pub async fn handle(spec: &ClusterSpec) -> anyhow::Result<()> {
    let service = service_for(spec)?;
    let nodes = cancellable(service.get_nodes(spec), interrupted()).await?;
    for node in &nodes {
        println!("{}", node_line(node));
    }
    Ok(())
}

/// `id, image, public address, private address, state, location`, tab separated
pub fn node_line(node: &NodeMetadata) -> String {
    let state = node.state.to_string();
    [
        node.id.as_str(),
        node.image_id.as_deref().unwrap_or_default(),
        node.first_public_address().unwrap_or_default(),
        node.first_private_address().unwrap_or_default(),
        state.as_str(),
        node.location_id.as_deref().unwrap_or_default(),
    ]
    .join("\t")
}
