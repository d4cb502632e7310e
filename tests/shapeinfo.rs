use shapematch::{OwnedImage, ShapeInfo, ShapeInfoProducer, SourceImage};

fn checker_template(size: usize) -> SourceImage {
    let data = (0..size * size)
        .map(|idx| {
            let (x, y) = (idx % size, idx / size);
            if (x / 8 + y / 8) % 2 == 0 {
                220u8
            } else {
                30u8
            }
        })
        .collect();
    SourceImage::gray(OwnedImage::new(data, size, size).unwrap())
}

#[test]
fn full_turn_with_ten_degree_steps_is_inclusive() {
    let mut producer = ShapeInfoProducer::new(checker_template(32), None, false).unwrap();
    producer.angle_range = [0.0, 360.0];
    producer.angle_step = 10.0;
    producer.produce_infos().unwrap();
    // 0, 10, ..., 360 inclusive.
    assert_eq!(producer.infos().len(), 37);
    assert!((producer.infos().last().unwrap().angle - 360.0).abs() < 1e-3);
}

#[test]
fn scale_major_ordering_with_angle_minor() {
    let mut producer = ShapeInfoProducer::new(checker_template(32), None, false).unwrap();
    producer.angle_range = [0.0, 90.0];
    producer.angle_step = 45.0;
    producer.scale_range = [0.5, 1.5];
    producer.scale_step = 0.5;
    producer.produce_infos().unwrap();

    let infos = producer.infos();
    assert_eq!(infos.len(), 9);
    // First block shares the smallest scale while angles advance.
    assert!((infos[0].scale - 0.5).abs() < 1e-6);
    assert!((infos[2].scale - 0.5).abs() < 1e-6);
    assert!((infos[2].angle - 90.0).abs() < 1e-3);
    assert!((infos[3].scale - 1.0).abs() < 1e-6);
}

#[test]
fn zero_steps_emit_a_single_variant_per_range_point() {
    let producer = ShapeInfoProducer::identity(checker_template(32), None).unwrap();
    assert_eq!(producer.infos(), &[ShapeInfo { angle: 0.0, scale: 1.0 }]);
}

#[test]
fn padding_depends_on_the_template_diagonal() {
    let producer = ShapeInfoProducer::new(checker_template(32), None, false).unwrap();
    // border = 1 + ceil(sqrt(32^2 + 32^2)) = 47; each side grows by 47 - 16.
    let warped = producer
        .src_of(ShapeInfo { angle: 0.0, scale: 1.0 })
        .unwrap();
    assert_eq!(warped.width(), 32 + 2 * (47 - 16));
    assert_eq!(warped.height(), 32 + 2 * (47 - 16));
}

#[test]
fn pre_padded_templates_are_taken_verbatim() {
    let producer = ShapeInfoProducer::new(checker_template(64), None, true).unwrap();
    let warped = producer
        .src_of(ShapeInfo { angle: 0.0, scale: 1.0 })
        .unwrap();
    assert_eq!(warped.width(), 64);
    assert_eq!(warped.height(), 64);
}

#[test]
fn default_mask_covers_everything_and_rotation_preserves_it() {
    let producer = ShapeInfoProducer::new(checker_template(32), None, false).unwrap();
    let mask = producer.mask_of(ShapeInfo { angle: 33.0, scale: 1.0 });
    // The mask center survives any rotation.
    let cx = mask.width() / 2;
    let cy = mask.height() / 2;
    assert_ne!(mask.pixel(cx, cy), 0);
}

#[test]
fn explicit_masks_are_padded_with_zeros() {
    let mask = OwnedImage::filled(32, 32, 255u8).unwrap();
    let producer = ShapeInfoProducer::new(checker_template(32), Some(mask), false).unwrap();
    let warped = producer.mask_of(ShapeInfo { angle: 0.0, scale: 1.0 });
    // Padded ring is excluded, original area survives.
    assert_eq!(warped.pixel(0, 0), 0);
    let c = warped.width() / 2;
    assert_ne!(warped.pixel(c, c), 0);
}

#[test]
fn mismatched_masks_are_rejected() {
    let mask = OwnedImage::filled(16, 16, 255u8).unwrap();
    assert!(ShapeInfoProducer::new(checker_template(32), Some(mask), false).is_err());
}

#[cfg(feature = "serde")]
#[test]
fn config_round_trips_through_json() {
    let mut producer = ShapeInfoProducer::new(checker_template(32), None, false).unwrap();
    producer.angle_range = [0.0, 60.0];
    producer.angle_step = 15.0;
    producer.scale_range = [0.9, 1.1];
    producer.scale_step = 0.1;
    producer.produce_infos().unwrap();

    let config = producer.config();
    let json = serde_json::to_string(&config).unwrap();
    let restored: shapematch::ProducerConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, config);

    let mut other = ShapeInfoProducer::new(checker_template(32), None, false).unwrap();
    other.set_config(restored);
    assert_eq!(other.infos(), producer.infos());
    assert_eq!(other.angle_step, 15.0);
}
