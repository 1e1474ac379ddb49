use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use image::AnimationDecoder;
use tilecycle::{
    AnimatedTile, AnimationFrame, ExportOpts, Gid, Layer, TileMap, Tileset, export_gif_file,
};

const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];
const YELLOW: [u8; 4] = [255, 255, 0, 255];
const MAGENTA: [u8; 4] = [255, 0, 255, 255];

/// Write a one-row atlas of solid 2x2 tiles and return its directory.
fn write_atlas(dir_name: &str, colors: &[[u8; 4]]) -> PathBuf {
    let dir = PathBuf::from("target").join(dir_name);
    std::fs::create_dir_all(&dir).unwrap();
    let img = image::RgbaImage::from_fn(colors.len() as u32 * 2, 2, |x, _| {
        image::Rgba(colors[(x / 2) as usize])
    });
    img.save(dir.join("tiles.png")).unwrap();
    dir
}

fn solid_tileset(tile_count: u32, animations: Vec<AnimatedTile>) -> Tileset {
    Tileset {
        first_gid: 1,
        columns: tile_count,
        tile_count,
        tile_width: 2,
        tile_height: 2,
        margin: 0,
        spacing: 0,
        image_source: "tiles.png".to_string(),
        animations,
    }
}

fn anim(local_id: u32, frames: &[(u32, u32)]) -> AnimatedTile {
    AnimatedTile {
        local_id,
        frames: frames
            .iter()
            .map(|&(tile_id, duration_ms)| AnimationFrame {
                tile_id,
                duration_ms,
            })
            .collect(),
    }
}

fn decode_gif(path: &PathBuf) -> Vec<image::Frame> {
    let reader = BufReader::new(File::open(path).unwrap());
    let decoder = image::codecs::gif::GifDecoder::new(reader).unwrap();
    decoder.into_frames().collect_frames().unwrap()
}

/// The worked example: tile A cycles every 100ms (2 frames of 50ms), tile B
/// every 150ms (3 frames of 50ms). The period is LCM(100, 150) = 300 with an
/// instant every 50ms, giving six frames of 50ms each.
#[test]
fn two_clip_map_exports_the_lcm_cycle() {
    let dir = write_atlas(
        "pipeline_lcm",
        &[RED, GREEN, BLUE, YELLOW, MAGENTA],
    );
    let map = TileMap {
        width: 2,
        height: 1,
        tile_width: 2,
        tile_height: 2,
        infinite: false,
        tilesets: vec![solid_tileset(
            5,
            vec![
                anim(0, &[(0, 50), (1, 50)]),
                anim(2, &[(2, 50), (3, 50), (4, 50)]),
            ],
        )],
        layers: vec![Layer {
            width: 2,
            height: 1,
            data: vec![Gid(1), Gid(3)],
        }],
    };

    let out = dir.join("out.gif");
    let stats = export_gif_file(&map, &dir, &ExportOpts::default(), &out).unwrap();
    assert_eq!(stats.period_ms, 300);
    assert_eq!(stats.frames_emitted, 6);
    assert_eq!(stats.frames_elided, 0);

    let frames = decode_gif(&out);
    assert_eq!(frames.len(), 6);

    let mut total_ms = 0u64;
    for frame in &frames {
        let (num, den) = frame.delay().numer_denom_ms();
        assert_eq!(num / den, 50);
        total_ms += u64::from(num / den);
        assert_eq!(frame.buffer().dimensions(), (4, 2));
    }
    assert_eq!(total_ms, 300, "holds sum to the period");

    // Frame 0 shows each clip's first tile; frame 1 each clip's second.
    let f0 = frames[0].buffer();
    assert_eq!(f0.get_pixel(0, 0).0, RED);
    assert_eq!(f0.get_pixel(2, 0).0, BLUE);
    let f1 = frames[1].buffer();
    assert_eq!(f1.get_pixel(0, 0).0, GREEN);
    assert_eq!(f1.get_pixel(2, 0).0, YELLOW);
}

#[test]
fn static_map_exports_a_single_frame_gif() {
    let dir = write_atlas("pipeline_static", &[RED, GREEN, BLUE, YELLOW]);
    let map = TileMap {
        width: 2,
        height: 2,
        tile_width: 2,
        tile_height: 2,
        infinite: false,
        tilesets: vec![solid_tileset(4, vec![])],
        layers: vec![Layer {
            width: 2,
            height: 2,
            data: vec![Gid(1), Gid(2), Gid(3), Gid(4)],
        }],
    };

    let out = dir.join("out.gif");
    let stats = export_gif_file(&map, &dir, &ExportOpts::default(), &out).unwrap();
    assert_eq!(stats.frames_emitted, 1);
    assert_eq!(stats.period_ms, 0);

    let frames = decode_gif(&out);
    assert_eq!(frames.len(), 1);
    // Canvas is map.width * tile_width x map.height * tile_height.
    assert_eq!(frames[0].buffer().dimensions(), (4, 4));
    assert_eq!(frames[0].buffer().get_pixel(0, 0).0, RED);
    assert_eq!(frames[0].buffer().get_pixel(3, 3).0, YELLOW);
}

#[test]
fn animation_on_an_unreferenced_tile_still_exports_statically() {
    let dir = write_atlas("pipeline_unreferenced", &[RED, GREEN]);
    let map = TileMap {
        width: 1,
        height: 1,
        tile_width: 2,
        tile_height: 2,
        infinite: false,
        tilesets: vec![solid_tileset(
            2,
            // gid 2 animates, but only gid 1 is placed on the layer.
            vec![anim(1, &[(0, 40), (1, 40)])],
        )],
        layers: vec![Layer {
            width: 1,
            height: 1,
            data: vec![Gid(1)],
        }],
    };

    let out = dir.join("out.gif");
    let stats = export_gif_file(&map, &dir, &ExportOpts::default(), &out).unwrap();
    assert_eq!(stats.frames_emitted, 1);
    assert_eq!(stats.period_ms, 0);
    assert_eq!(decode_gif(&out).len(), 1);
}

#[test]
fn sub_10ms_holds_accumulate_without_losing_time() {
    // 25ms holds cannot be represented exactly in GIF's 10ms units; the
    // carry keeps the four-frame cycle at exactly 100ms.
    let dir = write_atlas("pipeline_carry", &[RED, GREEN, BLUE, YELLOW]);
    let map = TileMap {
        width: 1,
        height: 1,
        tile_width: 2,
        tile_height: 2,
        infinite: false,
        tilesets: vec![solid_tileset(
            4,
            vec![anim(0, &[(0, 25), (1, 25), (2, 25), (3, 25)])],
        )],
        layers: vec![Layer {
            width: 1,
            height: 1,
            data: vec![Gid(1)],
        }],
    };

    let out = dir.join("out.gif");
    let stats = export_gif_file(&map, &dir, &ExportOpts::default(), &out).unwrap();
    assert_eq!(stats.period_ms, 100);
    assert_eq!(stats.frames_emitted, 4);

    let frames = decode_gif(&out);
    let total_ms: u64 = frames
        .iter()
        .map(|f| {
            let (num, den) = f.delay().numer_denom_ms();
            u64::from(num / den)
        })
        .sum();
    assert_eq!(total_ms, 100);
}
