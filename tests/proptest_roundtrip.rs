use std::collections::HashSet;

use colkit::{FormatVersion, Triangle, Vertex, export_collision, import_collision};
use proptest::prelude::*;

fn vertices() -> impl Strategy<Value = Vec<Vertex>> {
    prop::collection::vec(
        (-1.0e4f32..1.0e4, -1.0e4f32..1.0e4, -1.0e4f32..1.0e4)
            .prop_map(|(x, y, z)| Vertex::new(x, y, z)),
        1..16,
    )
}

fn triangle(vertex_count: usize) -> impl Strategy<Value = Triangle> {
    let index = 0..vertex_count as u16;
    (
        [index.clone(), index.clone(), index],
        prop::sample::select(vec![0u16, 0x8000, 0x0102, 0xFFFF]),
        any::<u8>(),
        any::<u8>(),
        prop::option::of(any::<u16>()),
    )
        .prop_map(
            |(vertex_indices, col_type, terrain_type, unknown, parameter)| Triangle {
                vertex_indices,
                col_type,
                terrain_type,
                unknown,
                parameter,
            },
        )
}

fn mesh() -> impl Strategy<Value = (Vec<Vertex>, Vec<Triangle>)> {
    vertices().prop_flat_map(|vertices| {
        let triangles = prop::collection::vec(triangle(vertices.len()), 0..48);
        (Just(vertices), triangles)
    })
}

fn version() -> impl Strategy<Value = FormatVersion> {
    prop_oneof![Just(FormatVersion::Split), Just(FormatVersion::Wide)]
}

fn key(triangle: &Triangle) -> (u16, bool) {
    (triangle.col_type, triangle.has_parameter())
}

proptest! {
    #[test]
    fn grouped_input_round_trips_exactly((vertices, mut triangles) in mesh(), version in version()) {
        triangles.sort_by_key(key);

        let bytes = export_collision(&vertices, &triangles, version).unwrap();
        let (read_vertices, read_triangles) = import_collision(&bytes, version).unwrap();

        prop_assert_eq!(read_vertices, vertices);
        prop_assert_eq!(read_triangles, triangles);
    }

    #[test]
    fn any_input_comes_back_contiguous((vertices, triangles) in mesh(), version in version()) {
        let bytes = export_collision(&vertices, &triangles, version).unwrap();
        let (_, read) = import_collision(&bytes, version).unwrap();
        prop_assert_eq!(read.len(), triangles.len());

        // Each key occupies exactly one run.
        let mut seen = HashSet::new();
        for (i, triangle) in read.iter().enumerate() {
            if i == 0 || key(&read[i - 1]) != key(triangle) {
                prop_assert!(seen.insert(key(triangle)), "key {:?} split", key(triangle));
            }
        }

        // Stable within a key, so filtering both sides by key must agree.
        for k in &seen {
            let expected: Vec<_> = triangles.iter().filter(|t| key(t) == *k).collect();
            let actual: Vec<_> = read.iter().filter(|t| key(t) == *k).collect();
            prop_assert_eq!(actual, expected);
        }
    }

    #[test]
    fn file_size_follows_from_counts((vertices, triangles) in mesh(), version in version()) {
        let bytes = export_collision(&vertices, &triangles, version).unwrap();
        let groups: HashSet<_> = triangles.iter().map(key).collect();
        let with_parameters = triangles.iter().filter(|t| t.has_parameter()).count();
        let expected = 16
            + 24 * groups.len()
            + 12 * vertices.len()
            + 8 * triangles.len()
            + 2 * with_parameters;
        prop_assert_eq!(bytes.len(), expected);
    }

    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256), version in version()) {
        let _ = import_collision(&bytes, version);
    }
}
