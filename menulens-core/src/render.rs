//! Interactive scatter rendering
//!
//! The table is turned into a Plotly figure (one trace per category) that
//! serializes straight to the JSON plotly.js expects. `to_html` wraps it in
//! a standalone page; `show` writes that page to the temp directory and hands
//! it to the platform opener.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

use serde::Serialize;

use crate::config::RenderConfig;
use crate::error::VizError;
use crate::models::table::{Category, ProjectionTable};

const PLOT_DIV_ID: &str = "menulens-plot";

// ============================================================================
// Figure model (Plotly JSON schema subset)
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Figure {
    pub data: Vec<ScatterTrace>,
    pub layout: Layout,
    #[serde(skip)]
    plotly_js_url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScatterTrace {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub mode: &'static str,
    pub name: String,
    pub legendgroup: String,
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub text: Vec<String>,
    pub textposition: &'static str,
    pub marker: Marker,
    /// Similarity per point, `null` where absent.
    pub customdata: Vec<Option<f64>>,
    pub hovertemplate: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Marker {
    pub color: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Title {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Legend {
    pub orientation: &'static str,
    pub x: f32,
    pub y: f32,
    pub xanchor: &'static str,
    pub yanchor: &'static str,
    pub title: Title,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Axis {
    pub title: Title,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Layout {
    pub title: Title,
    pub height: u32,
    pub legend: Legend,
    pub xaxis: Axis,
    pub yaxis: Axis,
}

// ============================================================================
// Building
// ============================================================================

fn category_style(category: Category, config: &RenderConfig) -> (&str, &str) {
    match category {
        Category::Query => (config.query_category.as_str(), config.query_color.as_str()),
        Category::Candidate => (
            config.candidate_category.as_str(),
            config.candidate_color.as_str(),
        ),
    }
}

/// Build the scatter figure for a projected table.
///
/// Categories without points get no trace.
pub fn build_figure(table: &ProjectionTable, config: &RenderConfig) -> Figure {
    let mut data = Vec::with_capacity(2);

    for category in [Category::Query, Category::Candidate] {
        let points: Vec<_> = table.by_category(category).collect();
        if points.is_empty() {
            continue;
        }
        let (name, color) = category_style(category, config);
        data.push(ScatterTrace {
            kind: "scatter",
            mode: "markers+text",
            name: name.to_string(),
            legendgroup: name.to_string(),
            x: points.iter().map(|p| p.x).collect(),
            y: points.iter().map(|p| p.y).collect(),
            text: points.iter().map(|p| p.label.clone()).collect(),
            textposition: "top center",
            marker: Marker {
                color: color.to_string(),
            },
            customdata: points.iter().map(|p| p.similarity).collect(),
            hovertemplate: format!(
                "type={}<br>x=%{{x}}<br>y=%{{y}}<br>label=%{{text}}<br>similarity=%{{customdata}}<extra></extra>",
                name
            ),
        });
    }

    Figure {
        data,
        layout: Layout {
            title: Title {
                text: config.title.clone(),
            },
            height: config.height,
            legend: Legend {
                orientation: "h",
                x: 1.0,
                y: 1.05,
                xanchor: "right",
                yanchor: "bottom",
                title: Title {
                    text: "type".to_string(),
                },
            },
            xaxis: Axis {
                title: Title {
                    text: "x".to_string(),
                },
            },
            yaxis: Axis {
                title: Title {
                    text: "y".to_string(),
                },
            },
        },
        plotly_js_url: config.plotly_js_url.clone(),
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

impl Figure {
    pub fn to_json(&self) -> Result<String, VizError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Standalone HTML page that renders the figure with plotly.js.
    pub fn to_html(&self) -> Result<String, VizError> {
        // "</" would close the script element early; "\/" is a valid JSON escape
        let figure_json = serde_json::to_string(self)?.replace("</", "<\\/");
        Ok(format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{script}"></script>
</head>
<body>
<div id="{div}" style="width:100%;height:{height}px;"></div>
<script>
const figure = {figure};
Plotly.newPlot("{div}", figure.data, figure.layout, {{"responsive": true}});
</script>
</body>
</html>
"#,
            title = escape_html(&self.layout.title.text),
            script = escape_html(&self.plotly_js_url),
            div = PLOT_DIV_ID,
            height = self.layout.height,
            figure = figure_json,
        ))
    }
}

pub fn write_html(figure: &Figure, path: &Path) -> Result<(), VizError> {
    std::fs::write(path, figure.to_html()?)?;
    tracing::info!(path = %path.display(), "Wrote chart");
    Ok(())
}

// ============================================================================
// Display
// ============================================================================

fn opener_command(path: &Path) -> Command {
    #[cfg(target_os = "macos")]
    let command = {
        let mut c = Command::new("open");
        c.arg(path);
        c
    };
    #[cfg(target_os = "windows")]
    let command = {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]).arg(path);
        c
    };
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let command = {
        let mut c = Command::new("xdg-open");
        c.arg(path);
        c
    };
    command
}

/// Spawn `command` detached from stdio and wait for it on a background
/// thread, so the exited child is reaped instead of lingering as a zombie.
fn spawn_reaped(mut command: Command) -> Result<JoinHandle<io::Result<ExitStatus>>, VizError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| VizError::Open {
            opener: command.get_program().to_string_lossy().to_string(),
            message: e.to_string(),
        })?;
    Ok(std::thread::spawn(move || {
        let status = child.wait();
        match &status {
            Ok(status) if !status.success() => {
                tracing::warn!(%status, "Chart opener exited with an error")
            }
            Err(e) => tracing::warn!(error = %e, "Failed to wait for chart opener"),
            Ok(_) => {}
        }
        status
    }))
}

/// Open an already written chart with the platform's default handler.
pub fn open_in_browser(path: &Path) -> Result<(), VizError> {
    spawn_reaped(opener_command(path))?;
    Ok(())
}

/// Write the figure to a fresh file in the temp directory and open it.
///
/// Returns the path of the written chart.
pub fn show(figure: &Figure) -> Result<PathBuf, VizError> {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let path = std::env::temp_dir().join(format!(
        "menulens-{}-{}.html",
        std::process::id(),
        nanos
    ));
    write_html(figure, &path)?;
    open_in_browser(&path)?;
    Ok(path)
}
