//! Style configuration fixtures.

/// Extent used by all generated vector tiles.
pub const TEST_EXTENT: u32 = 4096;

/// Color of the single add style in [`style_config_json`].
pub const ADD_RGB: (u8, u8, u8) = (255, 0, 0);

/// Delete color in [`style_config_json`].
pub const DEL_RGB: (u8, u8, u8) = (0, 0, 255);

/// A one-provider style table whose only template is `template`.
///
/// Zoom threshold 5, one opaque red add style, blue deletions, and width
/// stops `{1: 0.5, 10: 2.5}`.
pub fn style_config_json(template: &str) -> String {
    serde_json::json!([{
        "id": "test-provider",
        "name": "Test Provider",
        "tileUrlTemplates": [template],
        "startZoom": 0,
        "zoomThreshold": 5,
        "lineStyles": [
            { "color": format!("rgb({}, {}, {})", ADD_RGB.0, ADD_RGB.1, ADD_RGB.2), "widthFraction": 1.0 }
        ],
        "lineWidthStops": { "1": 0.5, "10": 2.5 },
        "delWidthFactor": 1.5,
        "delColor": format!("rgb({}, {}, {})", DEL_RGB.0, DEL_RGB.1, DEL_RGB.2)
    }])
    .to_string()
}
