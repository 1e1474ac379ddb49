use tilecycle::{TileMap, Timeline};

#[test]
fn json_fixture_validates() {
    let s = include_str!("data/lava_pond.json");
    let map: TileMap = serde_json::from_str(s).unwrap();
    map.validate().unwrap();
}

#[test]
fn json_fixture_builds_its_timeline() {
    let s = include_str!("data/lava_pond.json");
    let map: TileMap = serde_json::from_str(s).unwrap();

    let timeline = Timeline::build(&map, 64).unwrap();
    assert_eq!(timeline.period_ms, 500);
    let offsets: Vec<u64> = timeline.instants.iter().map(|i| i.offset_ms).collect();
    assert_eq!(offsets, vec![0, 200, 400]);
}

#[test]
fn json_fixture_rejects_truncated_layer_data() {
    let s = include_str!("data/lava_pond.json");
    let mut map: TileMap = serde_json::from_str(s).unwrap();
    map.layers[0].data.pop();
    assert!(map.validate().is_err());
}
