//! Interactive flamegraph export.
//!
//! Serializes one or more document trees into a JSON payload embedded in a
//! fixed HTML template hosting the d3-flame-graph viewer, for static,
//! offline viewing. The template is an opaque string asset; the exporter
//! only fills the data placeholder.

use log::info;

use crate::output::document::{render_document, Document};
use crate::render::RenderNode;
use crate::utils::error::FlamegraphError;

const DATA_PLACEHOLDER: &str = "/*data*/ []";

const TEMPLATE: &str = r##"<!DOCTYPE html>
<html>
  <head>
    <title>flametrace - flamegraph</title>
    <meta http-equiv="Content-Type" content="text/html; charset=UTF-8" />
    <meta name="viewport" content="width=device-width" />
    <script>const data = /*data*/ [];</script>
  <body>
    <pre id="details"></pre>
    <script type="module">
      import {select} from "https://cdn.jsdelivr.net/npm/d3-selection@3.0.0/+esm";
      import {flamegraph} from "https://cdn.jsdelivr.net/npm/d3-flame-graph@4.1.3/+esm"
      import style from "https://cdn.jsdelivr.net/npm/d3-flame-graph@4.1.3/dist/d3-flamegraph.css" with {type: "css"}
      style.insertRule("body {margin: 0; min-width: 960px; min-height: 100vh; display: flex; align-items: center; flex-wrap: wrap; justify-content: center}", 0)
      style.insertRule("#details {width: 960px; height: 240px; padding: 5px; overflow-x: auto; background: white}")
      document.adoptedStyleSheets.push(style)

      const details = document.getElementById("details")

      function label(d) {return `${d.data.name}\nlength: ${d.data.length}ms (${d.data.representative > 0.5 ? '' : '⚠️ '}${d.data.representative*100}%)\ncalls: ${JSON.stringify(d.data.calls, null, 2)}`}
      function detailsHandler(d) {if (d) {details.textContent = d}}

      for (const graph of data) {
        const graphDiv = document.createElement("div")

        select(graphDiv)
          .datum(graph)
          .call(
            flamegraph()
              .sort(false)
              .label(label)
              .setDetailsHandler(detailsHandler)
          );

        document.body.insertBefore(graphDiv, details)
      }
    </script>
  </body>
</html>"##;

/// Renders a self-contained flamegraph HTML page.
///
/// With `split`, every top-level child becomes its own graph, each wrapped
/// in a synthetic single-child copy of the root so per-phase graphs keep the
/// session context.
///
/// # Errors
/// [`FlamegraphError::Serialization`] when the JSON payload cannot be built.
/// Callers exporting recorded payloads must reject cyclic values first; see
/// [`crate::Tracker::to_flamegraph`].
pub fn render_flamegraph(node: &RenderNode, split: bool) -> Result<String, FlamegraphError> {
    let root = render_document(node);

    let data: Vec<Document> = if split {
        root.children
            .iter()
            .map(|child| Document {
                children: vec![child.clone()],
                ..root.clone()
            })
            .collect()
    } else {
        vec![root]
    };

    // Escaping `<` keeps the inline <script> block intact no matter what the
    // recorded names contain.
    let payload = serde_json::to_string(&data)?.replace('<', "\\u003c");
    let html = TEMPLATE.replace(DATA_PLACEHOLDER, &payload);
    info!("flamegraph generated ({} bytes)", html.len());
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Tracker;

    #[test]
    fn test_template_has_data_placeholder() {
        assert!(TEMPLATE.contains(DATA_PLACEHOLDER));
    }

    #[test]
    fn test_script_tags_in_names_are_escaped() {
        let tracker = Tracker::with_calibration(0);
        {
            let session = tracker.activate();
            let _scope = session.action("</script><script>alert(1)");
        }

        let html = render_flamegraph(&tracker.to_render(0.0, false), false).unwrap();
        assert!(!html.contains("</script><script>alert(1)"));
        assert!(html.contains("\\u003c/script>\\u003cscript>"));
    }
}
