//! End-to-end correction rendering against generated tiles.

use renderer::{fix_tile, RenderError};
use storage::CorrectionSet;
use test_utils::{
    decode_rgba, differing_pixels, distance_to_segment, line_feature, point_feature, polygon_feature,
    solid_jpeg, solid_png, style_config_json, VectorTileBuilder, ADD_RGB, DEL_RGB,
};
use tile_common::{LayerConfig, LayerConfigTable, TileCoord};
use vector_tile::decode;

const BACKGROUND: (u8, u8, u8) = (240, 240, 240);

fn test_config() -> LayerConfig {
    let table = LayerConfigTable::from_json(&style_config_json("https://t.example/{z}/{x}/{y}.png"))
        .expect("fixture config");
    table.configs()[0].clone()
}

fn corrections(builder: VectorTileBuilder) -> CorrectionSet {
    CorrectionSet::from_decoded(decode(&builder.build()).expect("fixture tile decodes"))
}

fn horizontal_line() -> VectorTileBuilder {
    VectorTileBuilder::new().layer("to-add-osm", vec![line_feature(&[&[(0, 2048), (4096, 2048)]])])
}

#[test]
fn test_added_line_only_touches_pixels_near_it() {
    let config = test_config();
    let original = solid_png(256, 256, BACKGROUND);
    let set = corrections(horizontal_line());

    let fixed = fix_tile(&original, &config, TileCoord::new(10, 5, 5), &set)
        .expect("render")
        .expect("corrections present");

    let before = decode_rgba(&original);
    let after = decode_rgba(&fixed);
    assert_eq!(after.dimensions(), (256, 256));

    let changed = differing_pixels(&before, &after);
    assert!(!changed.is_empty());

    // width at z10 is 2.5px; allow for anti-aliasing at the edges
    let half_width = 2.5 / 2.0 + 1.5;
    for (x, y) in changed {
        let center = (f64::from(x) + 0.5, f64::from(y) + 0.5);
        let d = distance_to_segment(center, (0.0, 128.0), (256.0, 128.0));
        assert!(d <= half_width, "pixel ({x}, {y}) changed at distance {d}");
    }

    assert_eq!(after.get_pixel(128, 128).0, [ADD_RGB.0, ADD_RGB.1, ADD_RGB.2, 255]);
    assert_eq!(after.get_pixel(128, 20).0, [BACKGROUND.0, BACKGROUND.1, BACKGROUND.2, 255]);
}

#[test]
fn test_deletions_paint_del_color() {
    let config = test_config();
    let original = solid_png(256, 256, BACKGROUND);
    let set = corrections(
        VectorTileBuilder::new().layer("to-del-osm", vec![line_feature(&[&[(2048, 0), (2048, 4096)]])]),
    );

    let fixed = fix_tile(&original, &config, TileCoord::new(10, 1, 1), &set)
        .unwrap()
        .unwrap();
    let after = decode_rgba(&fixed);
    assert_eq!(after.get_pixel(128, 100).0, [DEL_RGB.0, DEL_RGB.1, DEL_RGB.2, 255]);

    // delete strokes are delWidthFactor times wider
    let half_width = 2.5 * 1.5 / 2.0 + 1.5;
    for (x, y) in differing_pixels(&decode_rgba(&original), &after) {
        let d = distance_to_segment((f64::from(x) + 0.5, f64::from(y) + 0.5), (128.0, 0.0), (128.0, 256.0));
        assert!(d <= half_width);
    }
}

#[test]
fn test_additions_draw_over_deletions() {
    let config = test_config();
    let original = solid_png(256, 256, BACKGROUND);
    let same_path: &[(i32, i32)] = &[(0, 2048), (4096, 2048)];
    let set = corrections(
        VectorTileBuilder::new()
            .layer("to-add-osm", vec![line_feature(&[same_path])])
            .layer("to-del-osm", vec![line_feature(&[same_path])]),
    );

    let fixed = fix_tile(&original, &config, TileCoord::new(10, 1, 1), &set)
        .unwrap()
        .unwrap();
    let after = decode_rgba(&fixed);
    assert_eq!(after.get_pixel(64, 128).0, [ADD_RGB.0, ADD_RGB.1, ADD_RGB.2, 255]);
}

#[test]
fn test_no_corrections_returns_none() {
    let config = test_config();
    let original = solid_png(256, 256, BACKGROUND);
    let result = fix_tile(&original, &config, TileCoord::new(10, 1, 1), &CorrectionSet::empty()).unwrap();
    assert!(result.is_none());
}

#[test]
fn test_coarse_layers_below_threshold() {
    let config = test_config();
    let original = solid_png(256, 256, BACKGROUND);

    // fine layers are ignored at z3
    let fine_only = corrections(horizontal_line());
    assert!(fix_tile(&original, &config, TileCoord::new(3, 1, 1), &fine_only)
        .unwrap()
        .is_none());

    let coarse = corrections(
        VectorTileBuilder::new().layer("to-add-ne", vec![line_feature(&[&[(0, 2048), (4096, 2048)]])]),
    );
    let fixed = fix_tile(&original, &config, TileCoord::new(3, 1, 1), &coarse)
        .unwrap()
        .expect("coarse corrections apply below threshold");
    assert!(!differing_pixels(&decode_rgba(&original), &decode_rgba(&fixed)).is_empty());
}

#[test]
fn test_retina_tile_scales_geometry_and_width() {
    let config = test_config();
    let original = solid_png(512, 512, BACKGROUND);
    let set = corrections(horizontal_line());

    let fixed = fix_tile(&original, &config, TileCoord::new(10, 1, 1), &set)
        .unwrap()
        .unwrap();
    let before = decode_rgba(&original);
    let after = decode_rgba(&fixed);
    assert_eq!(after.dimensions(), (512, 512));
    assert_eq!(after.get_pixel(256, 256).0, [ADD_RGB.0, ADD_RGB.1, ADD_RGB.2, 255]);
    // 5px wide at 2x
    assert_eq!(after.get_pixel(256, 254).0, [ADD_RGB.0, ADD_RGB.1, ADD_RGB.2, 255]);

    let half_width = 5.0 / 2.0 + 1.5;
    for (x, y) in differing_pixels(&before, &after) {
        let d = distance_to_segment((f64::from(x) + 0.5, f64::from(y) + 0.5), (0.0, 256.0), (512.0, 256.0));
        assert!(d <= half_width);
    }
}

#[test]
fn test_custom_extent_is_respected() {
    let config = test_config();
    let original = solid_png(256, 256, BACKGROUND);
    let set = corrections(VectorTileBuilder::new().layer_with_extent(
        "to-add-osm",
        512,
        vec![line_feature(&[&[(0, 256), (512, 256)]])],
    ));

    let fixed = fix_tile(&original, &config, TileCoord::new(10, 1, 1), &set)
        .unwrap()
        .unwrap();
    let after = decode_rgba(&fixed);
    assert_eq!(after.get_pixel(100, 128).0, [ADD_RGB.0, ADD_RGB.1, ADD_RGB.2, 255]);
}

#[test]
fn test_polygons_stroke_outline_and_points_are_ignored() {
    let config = test_config();
    let original = solid_png(256, 256, BACKGROUND);
    let set = corrections(VectorTileBuilder::new().layer(
        "to-add-osm",
        vec![
            polygon_feature(&[(1024, 1024), (3072, 1024), (3072, 3072), (1024, 3072)]),
            point_feature((200, 200)),
        ],
    ));

    let fixed = fix_tile(&original, &config, TileCoord::new(10, 1, 1), &set)
        .unwrap()
        .unwrap();
    let after = decode_rgba(&fixed);
    // outline at x=64..192, y=64..192; interior untouched
    assert_eq!(after.get_pixel(128, 64).0, [ADD_RGB.0, ADD_RGB.1, ADD_RGB.2, 255]);
    assert_eq!(after.get_pixel(128, 128).0, [BACKGROUND.0, BACKGROUND.1, BACKGROUND.2, 255]);
    assert_eq!(after.get_pixel(12, 12).0, [BACKGROUND.0, BACKGROUND.1, BACKGROUND.2, 255]);
}

#[test]
fn test_jpeg_stays_jpeg() {
    let config = test_config();
    let original = solid_jpeg(256, 256, BACKGROUND);
    let set = corrections(horizontal_line());

    let fixed = fix_tile(&original, &config, TileCoord::new(10, 1, 1), &set)
        .unwrap()
        .unwrap();
    assert_eq!(&fixed[..2], &[0xff, 0xd8]);

    let after = decode_rgba(&fixed);
    assert_eq!(after.dimensions(), (256, 256));
    // chroma subsampling blurs a thin line, so only check the hue
    let p = after.get_pixel(128, 128).0;
    assert!(p[0] > p[1] + 40 && p[0] > p[2] + 40, "expected red, got {:?}", p);
    let far = after.get_pixel(128, 20).0;
    assert!((i32::from(far[1]) - i32::from(BACKGROUND.1)).abs() <= 4);
}

#[test]
fn test_undecodable_image_is_an_error() {
    let config = test_config();
    let set = corrections(horizontal_line());

    let err = fix_tile(b"definitely not a tile", &config, TileCoord::new(10, 1, 1), &set).unwrap_err();
    assert!(matches!(err, RenderError::UnsupportedFormat(_)));

    let mut truncated = solid_png(256, 256, BACKGROUND);
    truncated.truncate(40);
    let err = fix_tile(&truncated, &config, TileCoord::new(10, 1, 1), &set).unwrap_err();
    assert!(matches!(err, RenderError::ImageDecode(_)));
}
