//! Neo4j standards graph.
//!
//! A connection is opened per request, matching the short-lived query
//! pattern of the graph surface. Results come back in a Cytoscape-
//! compatible `{nodes, edges}` shape.

use neo4rs::{query, Graph, Node, Relation};
use serde_json::{json, Value};
use tracing::info;

use normgate_core::config::Neo4jSettings;
use normgate_error::GatewayError;

const RELATED_QUERY: &str = "MATCH (n:Standard)-[r:RELATED]->(m:Standard) \
     WHERE n.name CONTAINS $name \
     RETURN n, r, m";

/// Client over the standards graph.
#[derive(Debug, Clone)]
pub struct GraphClient {
    settings: Neo4jSettings,
}

impl GraphClient {
    /// Wrap connection settings.
    pub fn new(settings: Neo4jSettings) -> Self {
        Self { settings }
    }

    /// Bolt URI, surfaced by the health endpoint.
    pub fn uri(&self) -> &str {
        &self.settings.uri
    }

    async fn connect(&self) -> Result<Graph, GatewayError> {
        Graph::new(
            &self.settings.uri,
            &self.settings.user,
            &self.settings.password,
        )
        .await
        .map_err(|e| GatewayError::internal(format!("Neo4j连接失败: {e}")))
    }

    /// Standards related to `standard_name`, as Cytoscape nodes and edges.
    pub async fn related_data(&self, standard_name: &str) -> Result<Value, GatewayError> {
        let graph = self.connect().await?;
        let mut rows = graph
            .execute(query(RELATED_QUERY).param("name", standard_name))
            .await
            .map_err(|e| GatewayError::internal(format!("查询失败: {e}")))?;

        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| GatewayError::internal(format!("查询失败: {e}")))?
        {
            let n: Node = row
                .get("n")
                .map_err(|e| GatewayError::internal(format!("查询失败: {e}")))?;
            let m: Node = row
                .get("m")
                .map_err(|e| GatewayError::internal(format!("查询失败: {e}")))?;
            let r: Relation = row
                .get("r")
                .map_err(|e| GatewayError::internal(format!("查询失败: {e}")))?;

            let source: String = n.get("name").unwrap_or_default();
            let target: String = m.get("name").unwrap_or_default();
            let relation: String = r.get("relation").unwrap_or_default();

            nodes.push(json!({
                "data": {"id": source, "label": source, "level": 0}
            }));
            nodes.push(json!({
                "data": {"id": target, "label": target, "level": 1, "parent": source}
            }));
            edges.push(json!({
                "data": {
                    "id": format!("{source}_{target}"),
                    "source": source,
                    "target": target,
                    "label": relation,
                }
            }));
        }

        info!(
            standard_name = %standard_name,
            nodes = nodes.len(),
            edges = edges.len(),
            "graph query completed"
        );
        Ok(json!({"nodes": nodes, "edges": edges}))
    }

    /// Connection probe: `RETURN 1`.
    pub async fn ping(&self) -> Result<(), GatewayError> {
        let graph = self.connect().await?;
        let mut rows = graph
            .execute(query("RETURN 1 as test"))
            .await
            .map_err(|e| GatewayError::internal(format!("Neo4j连接失败: {e}")))?;
        rows.next()
            .await
            .map_err(|e| GatewayError::internal(format!("Neo4j连接失败: {e}")))?;
        Ok(())
    }
}
