//! Mermaid rendering of a compiled graph.

use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;

use crate::error::{AgentError, Result};
use crate::state::GraphState;

use super::compiled::CompiledGraph;
use super::{END, START};

pub const MERMAID_INK_URL: &str = "https://mermaid.ink";

impl<S: GraphState> CompiledGraph<S> {
    /// Flowchart source: solid arrows for fixed edges, dotted ones for the
    /// destinations of a conditional edge.
    pub fn draw_mermaid(&self) -> String {
        let mut out = String::from(
            "---\nconfig:\n  flowchart:\n    curve: linear\n---\ngraph TD;\n",
        );
        out.push_str(&format!("\t{START}([<p>{START}</p>]):::first\n"));
        for name in self.node_names() {
            out.push_str(&format!("\t{name}({name})\n"));
        }
        out.push_str(&format!("\t{END}([<p>{END}</p>]):::last\n"));

        for (from, to, conditional) in self.drawn_edges() {
            let arrow = if conditional { "-.->" } else { "-->" };
            out.push_str(&format!("\t{from} {arrow} {to};\n"));
        }

        out.push_str("\tclassDef default fill:#f2f0ff,line-height:1.2\n");
        out.push_str("\tclassDef first fill-opacity:0\n");
        out.push_str("\tclassDef last fill:#bfb6fc\n");
        out
    }

    /// Render the flowchart to PNG through mermaid.ink.
    pub async fn draw_mermaid_png(&self) -> Result<Vec<u8>> {
        self.draw_mermaid_png_with(MERMAID_INK_URL).await
    }

    pub async fn draw_mermaid_png_with(&self, base_url: &str) -> Result<Vec<u8>> {
        let encoded = URL_SAFE.encode(self.draw_mermaid());
        let url = format!("{}/img/{encoded}?type=png", base_url.trim_end_matches('/'));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| AgentError::Protocol(format!("http client error: {err}")))?;
        let resp = http
            .get(&url)
            .send()
            .await
            .map_err(|err| AgentError::Protocol(format!("mermaid render request error: {err}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            return Err(AgentError::Protocol(format!(
                "mermaid render failed with {status}"
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|err| AgentError::Protocol(format!("mermaid render read error: {err}")))?;
        Ok(bytes.to_vec())
    }

    /// Write the flowchart source to `path`, creating parent directories.
    pub async fn save_mermaid(&self, path: impl AsRef<Path>) -> Result<()> {
        write_file(path.as_ref(), self.draw_mermaid().as_bytes()).await
    }

    /// Render to PNG and write it to `path`, creating parent directories.
    pub async fn save_mermaid_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let png = self.draw_mermaid_png().await?;
        write_file(path.as_ref(), &png).await
    }
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    Ok(())
}
