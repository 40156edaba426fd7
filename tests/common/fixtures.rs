use super::builders::ItemRecordBuilder;
use lightbox::models::ItemRecord;

pub struct Fixtures;

impl Fixtures {
    /// Five images in one album with a spread of ratings, including an
    /// unrated one.
    pub fn rated_album() -> Vec<ItemRecord> {
        vec![
            ItemRecordBuilder::image(1).with_rating(5).build(),
            ItemRecordBuilder::image(2).with_rating(3).build(),
            ItemRecordBuilder::image(3).with_rating(1).build(),
            ItemRecordBuilder::image(4).with_rating(-1).build(),
            ItemRecordBuilder::image(5).with_rating(4).build(),
        ]
    }

    /// One of each format group the mime dimension distinguishes.
    pub fn mixed_formats() -> Vec<ItemRecord> {
        vec![
            ItemRecordBuilder::image(1).build(),
            ItemRecordBuilder::image(2)
                .with_name("screenshot.png")
                .with_format("PNG")
                .build(),
            ItemRecordBuilder::image(3)
                .with_name("DSC_0003.nef")
                .with_format("RAW-NEF")
                .build(),
            ItemRecordBuilder::image(4)
                .with_name("scan.dng")
                .with_format("RAW-DNG")
                .build(),
            ItemRecordBuilder::video(5).build(),
        ]
    }
}

pub fn bulk_records(count: usize) -> Vec<ItemRecord> {
    (0..count)
        .map(|i| {
            ItemRecordBuilder::image(i as i64 + 1)
                .with_rating((i % 6) as i32 - 1)
                .build()
        })
        .collect()
}
