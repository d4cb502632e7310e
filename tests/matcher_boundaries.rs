use shapematch::{
    CancelToken, Detector, MatchParams, OwnedImage, ShapeInfoProducer, ShapeMatchError,
    SourceImage, DEFAULT_CLASS,
};

fn ring_image(size: usize, outer: f32, inner: f32) -> SourceImage {
    let mut data = vec![0u8; size * size];
    let c = size as f32 / 2.0;
    for y in 0..size {
        for x in 0..size {
            let dx = x as f32 - c;
            let dy = y as f32 - c;
            let r = (dx * dx + dy * dy).sqrt();
            if r < outer && r >= inner {
                data[y * size + x] = 255;
            }
        }
    }
    SourceImage::gray(OwnedImage::new(data, size, size).unwrap())
}

fn small_params() -> MatchParams {
    MatchParams {
        num_features: 32,
        spread_tile: 4,
        scatter_distance: 4.0,
        ..MatchParams::default()
    }
}

#[test]
fn template_larger_than_search_image_matches_nothing() {
    let mut detector = Detector::new(small_params()).unwrap();
    let template = ring_image(64, 26.0, 18.0);
    let producer = ShapeInfoProducer::identity(template, None).unwrap();
    let search = SourceImage::gray(OwnedImage::filled(32, 32, 0u8).unwrap());

    let matches = detector
        .match_templates(&search, &producer, 50.0, None)
        .unwrap();
    assert!(matches.is_empty());
}

#[test]
fn featureless_search_images_score_zero() {
    let mut detector = Detector::new(small_params()).unwrap();
    let template = ring_image(64, 26.0, 18.0);
    let producer = ShapeInfoProducer::identity(template, None).unwrap();
    // Uniform gray: every magnitude is below the threshold.
    let search = SourceImage::gray(OwnedImage::filled(128, 128, 77u8).unwrap());

    let matches = detector
        .match_templates(&search, &producer, 1.0, None)
        .unwrap();
    assert!(matches.is_empty());
}

#[test]
fn power_of_two_sources_build_unscaled_pyramids() {
    let mut detector = Detector::new(small_params()).unwrap();
    let search = ring_image(128, 40.0, 30.0);
    detector.add_source(&search, None, "pow2").unwrap();
    // Level 0 keeps the full resolution when dimensions are 2^L aligned.
    let labels = detector.quantized_labels("pow2", 0).unwrap();
    assert_eq!(labels.width(), 128);
    assert_eq!(labels.height(), 128);
    let labels = detector.quantized_labels("pow2", 1).unwrap();
    assert_eq!(labels.width(), 64);
}

#[test]
fn unknown_ids_surface_id_not_found() {
    let mut detector = Detector::new(small_params()).unwrap();
    match detector.match_class("ghost", 50.0, None) {
        Err(ShapeMatchError::IdNotFound { id }) => assert_eq!(id, "ghost"),
        other => panic!("expected IdNotFound, got {other:?}"),
    }
    assert!(detector.matches("ghost").is_err());
    assert!(detector.best_matches("ghost").is_err());
}

#[test]
fn unproduced_infos_surface_shape_info_exhausted() {
    let mut detector = Detector::new(small_params()).unwrap();
    let producer = ShapeInfoProducer::new(ring_image(64, 26.0, 18.0), None, false).unwrap();
    // produce_infos was never called.
    match detector.add_template(&producer, "empty") {
        Err(ShapeMatchError::ShapeInfoExhausted) => {}
        other => panic!("expected ShapeInfoExhausted, got {other:?}"),
    }
}

#[test]
fn pre_cancelled_matches_abort_without_results() {
    let mut detector = Detector::new(small_params()).unwrap();
    let template = ring_image(64, 26.0, 18.0);
    let search = ring_image(128, 26.0, 18.0);
    let producer = ShapeInfoProducer::identity(template, None).unwrap();

    detector.add_source(&search, None, DEFAULT_CLASS).unwrap();
    detector.add_template(&producer, DEFAULT_CLASS).unwrap();

    let token = CancelToken::new();
    token.cancel();
    match detector.match_class(DEFAULT_CLASS, 50.0, Some(&token)) {
        Err(ShapeMatchError::Cancelled) => {}
        other => panic!("expected Cancelled, got {other:?}"),
    }
    // Partial results are discarded: nothing was stored for the class.
    assert!(detector.matches(DEFAULT_CLASS).is_err());
}

#[test]
fn zero_pyramid_levels_are_rejected_at_construction() {
    let params = MatchParams {
        pyramid_levels: 0,
        ..MatchParams::default()
    };
    match Detector::new(params) {
        Err(ShapeMatchError::InvalidInput { .. }) => {}
        other => panic!("expected InvalidInput, got {other:?}"),
    }
}

#[test]
fn removed_classes_forget_their_matches() {
    let mut detector = Detector::new(small_params()).unwrap();
    let template = ring_image(64, 26.0, 18.0);
    let search = ring_image(128, 26.0, 18.0);
    let producer = ShapeInfoProducer::identity(template, None).unwrap();
    detector
        .match_templates(&search, &producer, 40.0, None)
        .unwrap();
    assert!(detector.matches(DEFAULT_CLASS).is_ok());

    detector.remove_class(DEFAULT_CLASS);
    assert!(detector.matches(DEFAULT_CLASS).is_err());
}
