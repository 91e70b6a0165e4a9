use std::mem::size_of;

use super::grid::GridUniform;

#[test]
fn grid_wgsl_parses_and_validates() {
    let module = parse_wgsl("grid.wgsl", include_str!("shaders/grid.wgsl"));

    let mut validator =
        naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all());
    if let Err(error) = validator.validate(&module) {
        panic!("WGSL validation failed for grid.wgsl: {error:?}");
    }

    for entry in ["vs_main", "fs_fill", "fs_line"] {
        assert!(
            module.entry_points.iter().any(|e| e.name == entry),
            "missing entry point {entry}"
        );
    }
}

#[test]
fn grid_uniform_matches_wgsl_layout() {
    // 2 mat4 + 5 vec4 + 8 palette vec4
    assert_eq!(size_of::<GridUniform>(), 2 * 64 + 5 * 16 + 8 * 16);
    assert_eq!(size_of::<GridUniform>() % 16, 0);
}

fn parse_wgsl(label: &str, source: &str) -> naga::Module {
    naga::front::wgsl::parse_str(source).unwrap_or_else(|error| {
        panic!(
            "WGSL parse failed for {label}: {}",
            error.emit_to_string(source)
        )
    })
}
