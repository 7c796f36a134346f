//! Tests for provider matching against the shipped style configuration.

use test_utils::assert_approx_eq;
use tile_common::{LayerConfigTable, Rgba, TileCoord};

fn shipped_table() -> LayerConfigTable {
    LayerConfigTable::from_json(include_str!("../../../config/layer_configs.json"))
        .expect("shipped config must load")
}

// ============================================================================
// match_url
// ============================================================================

#[test]
fn test_shipped_config_loads_in_order() {
    let table = shipped_table();
    let ids: Vec<&str> = table.configs().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["osm-carto", "cartodb-dark", "cartodb-light", "cartodb-voyager", "opentopomap"]
    );
}

#[test]
fn test_match_osm_variants() {
    let table = shipped_table();
    for url in [
        "https://tile.openstreetmap.org/6/45/28.png",
        "http://tile.openstreetmap.org/6/45/28.png",
        "https://b.tile.openstreetmap.org/6/45/28.png",
        "https://tile.openstreetmap.org/6/45/28.png?cache=1",
    ] {
        let config = table.match_url(url).unwrap_or_else(|| panic!("no match for {url}"));
        assert_eq!(config.id, "osm-carto");
        assert_eq!(config.extract_coords(url), Some(TileCoord::new(6, 45, 28)));
    }
}

#[test]
fn test_match_cartodb_retina() {
    let table = shipped_table();
    let url = "https://a.basemaps.cartocdn.com/dark_all/7/91/54@2x.png";
    let config = table.match_url(url).expect("cartodb dark should match");
    assert_eq!(config.id, "cartodb-dark");
    assert_eq!(config.extract_coords(url), Some(TileCoord::new(7, 91, 54)));
}

#[test]
fn test_unknown_provider_is_unmatched() {
    let table = shipped_table();
    assert!(table
        .match_url("https://tiles.stadiamaps.com/tiles/outdoors/5/10/12.png")
        .is_none());
}

#[test]
fn test_first_config_wins() {
    let json = r#"[
        { "id": "first", "tileUrlTemplates": ["https://tile.example/{z}/{x}/{y}.png"] },
        { "id": "second", "tileUrlTemplates": ["https://{s}.example/{z}/{x}/{y}.png"] }
    ]"#;
    let table = LayerConfigTable::from_json(json).unwrap();
    assert_eq!(table.match_url("https://tile.example/1/1/1.png").unwrap().id, "first");
    assert_eq!(table.match_url("https://t.example/1/1/1.png").unwrap().id, "second");
}

// ============================================================================
// Styling
// ============================================================================

#[test]
fn test_shipped_styles_parse_colors() {
    let table = shipped_table();
    let osm = &table.configs()[0];
    assert_eq!(osm.del_color, Rgba::opaque(242, 239, 233));
    assert_eq!(osm.line_styles[0].color, Rgba::opaque(200, 180, 200));
    assert_eq!(osm.line_styles_for_zoom(2).count(), 1);
    assert_eq!(osm.line_styles_for_zoom(4).count(), 2);
}

#[test]
fn test_width_interpolation_example() {
    let json = r#"[{
        "id": "w",
        "tileUrlTemplates": ["https://w.example/{z}/{x}/{y}.png"],
        "lineWidthStops": { "1": 0.5, "10": 2.5 }
    }]"#;
    let table = LayerConfigTable::from_json(json).unwrap();
    let config = &table.configs()[0];
    assert_approx_eq!(config.line_width(5.0), 1.389, 0.001);
    assert_approx_eq!(config.line_width(0.0), 0.5, 1e-9);
    assert_approx_eq!(config.line_width(15.0), 2.5, 1e-9);
}

#[test]
fn test_malformed_template_aborts_load() {
    let json = r#"[{ "id": "bad", "tileUrlTemplates": ["https://bad.example/{z}/{x/{y}.png"] }]"#;
    let err = LayerConfigTable::from_json(json).unwrap_err();
    assert!(err.to_string().contains("Invalid configuration"));
}
