//! Standalone HTML output for maps.

use crate::map::{MapLayer, MapView};
use crate::{OpsError, Result};
use serde_json::{json, Value};
use std::fmt::Write;

/// Base layer tiles.
pub const BASE_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

const BASE_ATTRIBUTION: &str = "&copy; OpenStreetMap contributors";

const STYLE: &str = r#"
html, body { margin: 0; height: 100%; font-family: sans-serif; }
#map { position: absolute; inset: 0; overflow: hidden; background: #dde6ea; cursor: grab; }
#map.dragging { cursor: grabbing; }
#map img { position: absolute; width: 256px; height: 256px; user-select: none; -webkit-user-drag: none; }
#map svg { position: absolute; inset: 0; width: 100%; height: 100%; pointer-events: none; }
.panel { position: absolute; background: rgba(255,255,255,0.92); padding: 8px 10px; border-radius: 4px; box-shadow: 0 1px 4px rgba(0,0,0,0.3); font-size: 12px; }
#title { top: 10px; left: 50px; font-size: 15px; font-weight: bold; }
#zoom { top: 10px; left: 10px; padding: 0; }
#zoom button { display: block; width: 30px; height: 30px; border: 0; background: none; font-size: 18px; cursor: pointer; }
#legend { bottom: 24px; right: 10px; max-width: 260px; }
#legend .layer { margin-bottom: 6px; }
#legend .ramp { height: 10px; margin: 3px 0; border: 1px solid #999; }
#legend .bounds { display: flex; justify-content: space-between; }
#attribution { bottom: 0; right: 0; padding: 2px 6px; border-radius: 0; font-size: 11px; }
"#;

const SCRIPT: &str = r#"
(function () {
  var cfg = JSON.parse(document.getElementById('map-config').textContent);
  var map = document.getElementById('map');
  var TILE = 256, MAX_LAT = 85.0511287798;
  var zoom = cfg.view.zoom;

  function worldSize(z) { return TILE * Math.pow(2, z); }
  function project(lon, lat, z) {
    lat = Math.max(-MAX_LAT, Math.min(MAX_LAT, lat));
    var r = lat * Math.PI / 180;
    var y = (1 - Math.log(Math.tan(r) + 1 / Math.cos(r)) / Math.PI) / 2;
    return [(lon + 180) / 360 * worldSize(z), y * worldSize(z)];
  }
  var center = project(cfg.view.center_lon, cfg.view.center_lat, zoom);

  var panes = [{ url: cfg.base, opacity: 1 }].concat(cfg.layers.map(function (l) {
    return { url: l.tile_url, opacity: l.opacity };
  }));
  var svgNs = 'http://www.w3.org/2000/svg';

  function tileUrl(template, z, x, y) {
    return template.replace('{z}', z).replace('{x}', x).replace('{y}', y);
  }

  function rings(geometry, out) {
    if (!geometry) { return out; }
    switch (geometry.type) {
      case 'Polygon': return out.concat(geometry.coordinates);
      case 'MultiPolygon': geometry.coordinates.forEach(function (p) { out = out.concat(p); }); return out;
      case 'LineString': out.push(geometry.coordinates); return out;
      case 'MultiLineString': return out.concat(geometry.coordinates);
      case 'GeometryCollection': geometry.geometries.forEach(function (g) { out = rings(g, out); }); return out;
      case 'Feature': return rings(geometry.geometry, out);
      case 'FeatureCollection': geometry.features.forEach(function (f) { out = rings(f.geometry, out); }); return out;
      default: return out;
    }
  }
  var outline = rings(cfg.outline, []);

  function render() {
    var w = map.clientWidth, h = map.clientHeight;
    var left = center[0] - w / 2, top = center[1] - h / 2;
    var n = Math.pow(2, zoom);
    Array.prototype.slice.call(map.querySelectorAll('img, svg')).forEach(function (e) { e.remove(); });

    panes.forEach(function (pane) {
      for (var tx = Math.floor(left / TILE); tx <= Math.floor((left + w) / TILE); tx++) {
        for (var ty = Math.floor(top / TILE); ty <= Math.floor((top + h) / TILE); ty++) {
          if (ty < 0 || ty >= n) { continue; }
          var img = document.createElement('img');
          img.src = tileUrl(pane.url, zoom, ((tx % n) + n) % n, ty);
          img.style.left = (tx * TILE - left) + 'px';
          img.style.top = (ty * TILE - top) + 'px';
          img.style.opacity = pane.opacity;
          img.alt = '';
          map.appendChild(img);
        }
      }
    });

    if (outline.length) {
      var svg = document.createElementNS(svgNs, 'svg');
      outline.forEach(function (ring) {
        var d = ring.map(function (c, i) {
          var p = project(c[0], c[1], zoom);
          return (i ? 'L' : 'M') + (p[0] - left).toFixed(1) + ' ' + (p[1] - top).toFixed(1);
        }).join(' ');
        var path = document.createElementNS(svgNs, 'path');
        path.setAttribute('d', d);
        path.setAttribute('fill', 'none');
        path.setAttribute('stroke', '#d7301f');
        path.setAttribute('stroke-width', '2');
        svg.appendChild(path);
      });
      map.appendChild(svg);
    }
  }

  function setZoom(z) {
    z = Math.max(cfg.min_zoom, Math.min(cfg.max_zoom, z));
    if (z === zoom) { return; }
    var scale = Math.pow(2, z - zoom);
    center = [center[0] * scale, center[1] * scale];
    zoom = z;
    render();
  }

  var drag = null;
  map.addEventListener('mousedown', function (e) {
    drag = [e.clientX, e.clientY];
    map.classList.add('dragging');
  });
  window.addEventListener('mousemove', function (e) {
    if (!drag) { return; }
    center = [center[0] - (e.clientX - drag[0]), center[1] - (e.clientY - drag[1])];
    drag = [e.clientX, e.clientY];
    render();
  });
  window.addEventListener('mouseup', function () {
    drag = null;
    map.classList.remove('dragging');
  });
  map.addEventListener('wheel', function (e) {
    e.preventDefault();
    setZoom(zoom + (e.deltaY < 0 ? 1 : -1));
  }, { passive: false });
  document.getElementById('zoom-in').addEventListener('click', function () { setZoom(zoom + 1); });
  document.getElementById('zoom-out').addEventListener('click', function () { setZoom(zoom - 1); });
  window.addEventListener('resize', render);
  render();
})();
"#;

/// JSON that can sit inside a `<script>` element without ending it early.
pub fn script_safe_json(value: &Value) -> Result<String> {
    let text = serde_json::to_string(value)
        .map_err(|e| OpsError::Render(format!("cannot encode map configuration: {}", e)))?;
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    Ok(out)
}

/// Assemble the document.
pub(crate) fn render(
    title: &str,
    view: &MapView,
    layers: &[MapLayer],
    outline: Option<&Value>,
) -> Result<String> {
    let overlays: Vec<Value> = layers
        .iter()
        .map(|l| json!({"tile_url": l.tile_url, "opacity": l.opacity}))
        .collect();
    let config = json!({
        "view": view,
        "base": BASE_TILE_URL,
        "layers": overlays,
        "outline": outline,
        "min_zoom": 1,
        "max_zoom": 18,
    });
    let config = script_safe_json(&config)?;
    let title = html_escape::encode_text(title);

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    let _ = writeln!(html, "<title>{}</title>", title);
    let _ = writeln!(html, "<style>{}</style>", STYLE);
    html.push_str("</head>\n<body>\n<div id=\"map\"></div>\n");
    let _ = writeln!(html, "<div id=\"title\" class=\"panel\">{}</div>", title);
    html.push_str(
        "<div id=\"zoom\" class=\"panel\"><button id=\"zoom-in\" title=\"Zoom in\">+</button>\
         <button id=\"zoom-out\" title=\"Zoom out\">&minus;</button></div>\n",
    );
    if !layers.is_empty() {
        html.push_str("<div id=\"legend\" class=\"panel\">\n");
        for layer in layers {
            legend_entry(&mut html, layer);
        }
        html.push_str("</div>\n");
    }
    let _ = writeln!(html, "<div id=\"attribution\" class=\"panel\">{}</div>", BASE_ATTRIBUTION);
    let _ = writeln!(
        html,
        "<script id=\"map-config\" type=\"application/json\">{}</script>",
        config
    );
    let _ = writeln!(html, "<script>{}</script>", SCRIPT);
    html.push_str("</body>\n</html>\n");
    Ok(html)
}

fn legend_entry(html: &mut String, layer: &MapLayer) {
    let stops = layer
        .palette
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    // A single color still needs two stops.
    let stops = if layer.palette.len() == 1 {
        format!("{0}, {0}", stops)
    } else {
        stops
    };

    html.push_str("<div class=\"layer\">");
    let _ = write!(html, "<strong>{}</strong>", html_escape::encode_text(&layer.name));
    let _ = write!(
        html,
        "<div class=\"ramp\" style=\"background: linear-gradient(to right, {});\"></div>",
        html_escape::encode_double_quoted_attribute(&stops)
    );
    let _ = write!(
        html,
        "<div class=\"bounds\"><span>{}</span><span>{}</span></div>",
        layer.min, layer.max
    );
    if let Some(name) = &layer.source_name {
        match &layer.source_url {
            Some(url) if url.starts_with("https://") || url.starts_with("http://") => {
                let _ = write!(
                    html,
                    "<div>Source: <a href=\"{}\" target=\"_blank\" rel=\"noopener\">{}</a></div>",
                    html_escape::encode_double_quoted_attribute(url),
                    html_escape::encode_text(name)
                );
            }
            _ => {
                let _ = write!(html, "<div>Source: {}</div>", html_escape::encode_text(name));
            }
        }
    }
    html.push_str("</div>\n");
}
