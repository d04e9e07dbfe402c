// Property tests for tiling geometry and reordering
use image::{Rgba, RgbaImage};
use proptest::prelude::*;

use sticker_slicer::sticker::{
    tile_rects, tile_sheet, GridSpec, RasterSource, SlicerConfig, StickerSet,
};

fn small_set(count: u32) -> StickerSet {
    let sheet = RasterSource::from_rgba(RgbaImage::from_fn(count * 4, 4, |x, _| {
        Rgba([(x / 4) as u8, 0, 0, 255])
    }));
    tile_sheet(&sheet, GridSpec { cols: count, rows: 1 }, &SlicerConfig::default())
        .expect("tiling should succeed")
}

proptest! {
    #[test]
    fn tile_rects_are_row_major_and_inside_sheet(
        cols in 1u32..=20,
        rows in 1u32..=20,
        width in 20u32..2000,
        height in 20u32..2000,
    ) {
        let tiles = tile_rects(width, height, GridSpec { cols, rows }).expect("rects");

        prop_assert_eq!(tiles.len(), (cols * rows) as usize);
        for (i, tile) in tiles.iter().enumerate() {
            let (col, row) = (i as u32 % cols, i as u32 / cols);
            prop_assert_eq!(tile.x, col * (width / cols));
            prop_assert_eq!(tile.y, row * (height / rows));
            prop_assert!(tile.fits_within(width, height));
        }
    }

    #[test]
    fn move_then_move_back_restores_order(
        count in 2u32..=12,
        from_seed in 0usize..64,
        to_seed in 0usize..64,
    ) {
        let mut set = small_set(count);
        let len = set.len();
        let (from, to) = (from_seed % len, to_seed % len);
        let original = set.ids();

        set.move_item(from, to).expect("move");
        prop_assert_eq!(set.ids()[to], original[from]);
        set.move_item(to, from).expect("move back");

        prop_assert_eq!(set.ids(), original);
    }

    #[test]
    fn swap_is_an_involution(
        count in 1u32..=12,
        a_seed in 0usize..64,
        b_seed in 0usize..64,
    ) {
        let mut set = small_set(count);
        let len = set.len();
        let (a, b) = (a_seed % len, b_seed % len);
        let original = set.ids();

        set.swap(a, b).expect("swap");
        set.swap(a, b).expect("swap again");

        prop_assert_eq!(set.ids(), original);
    }
}
