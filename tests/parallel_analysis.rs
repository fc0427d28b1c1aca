use derma_vision::{
    AnalysisRequest, AnalyzerConfig, LesionLabel, LesionModel, ModelError, ModelHandle, ModelInput,
    ParallelPipeline, SkinAnalysisPipeline,
};
use image::{Rgb, RgbImage};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Always predicts "malignant" with 90% probability.
struct AlarmingModel;

impl LesionModel for AlarmingModel {
    fn input_size(&self) -> (u32, u32) {
        (32, 32)
    }

    fn predict(&self, input: &ModelInput) -> Result<Vec<f32>, ModelError> {
        assert_eq!(input.data.len(), 32 * 32 * 3);
        Ok(vec![0.05, 0.9, 0.05])
    }
}

fn counting_handle(calls: Arc<AtomicUsize>) -> Arc<ModelHandle> {
    Arc::new(ModelHandle::lazy(move || {
        calls.fetch_add(1, Ordering::SeqCst);
        // Widen the window in which racing callers could double-load.
        std::thread::sleep(Duration::from_millis(50));
        Ok(Arc::new(AlarmingModel) as Arc<dyn LesionModel>)
    }))
}

fn face_with_mole(offset: u32) -> RgbImage {
    let mut image = RgbImage::from_pixel(120, 120, Rgb([200, 160, 125]));
    let (cx, cy) = (40.0 + offset as f64, 60.0);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let (dx, dy) = (x as f64 - cx, y as f64 - cy);
        if dx * dx + dy * dy <= 144.0 {
            *pixel = Rgb([50, 30, 25]);
        }
    }
    image
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn model_loads_once_under_concurrent_analyses() {
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = SkinAnalysisPipeline::new(AnalyzerConfig::default(), Some(counting_handle(calls.clone())));
    let parallel = ParallelPipeline::with_workers(pipeline, 4);
    assert_eq!(parallel.pipeline().classifier_strategy(), "model");

    let images: Vec<RgbImage> = (0..8).map(|i| face_with_mole(i * 5)).collect();
    let results = parallel.analyze_batch(images, AnalysisRequest::none().with_lesions()).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for result in results {
        let lesions = result.expect("valid image").lesions.expect("requested");
        assert!(lesions.total_count() >= 1);
        assert!(lesions.details().iter().all(|c| c.label == LesionLabel::Malignant));
        assert!(lesions.details().iter().all(|c| c.confidence == 90.0));
    }
    parallel.shutdown().await.expect("clean shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn warm_up_loads_the_model_ahead_of_time() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handle = counting_handle(calls.clone());
    let pipeline = SkinAnalysisPipeline::new(AnalyzerConfig::default(), Some(handle.clone()));
    let parallel = ParallelPipeline::with_workers(pipeline, 2);

    let warmups = futures::future::join_all((0..6).map(|_| parallel.warm_up_model())).await;
    assert!(warmups.into_iter().all(|outcome| outcome.expect("worker ok")));
    assert!(handle.is_loaded());

    parallel
        .analyze_complete(Arc::new(face_with_mole(0)), AnalysisRequest::all())
        .await
        .expect("valid image");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_model_load_falls_back_to_heuristic() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let handle = Arc::new(ModelHandle::lazy(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(ModelError::Unavailable("weights not found".into()))
    }));
    let pipeline = SkinAnalysisPipeline::new(AnalyzerConfig::default(), Some(handle));
    let parallel = ParallelPipeline::with_workers(pipeline, 2);
    assert!(!parallel.warm_up_model().await.expect("worker ok"));

    let results = parallel
        .analyze_batch(vec![face_with_mole(0), face_with_mole(10)], AnalysisRequest::all())
        .await;
    for result in results {
        let lesions = result.expect("valid image").lesions.expect("requested");
        for classification in lesions.details() {
            assert!([60.0, 70.0, 75.0].contains(&classification.confidence));
        }
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn batch_preserves_order_and_isolates_bad_images() {
    let parallel = ParallelPipeline::with_workers(SkinAnalysisPipeline::default(), 3);
    let images = vec![
        RgbImage::from_pixel(40, 40, Rgb([200, 160, 125])),
        RgbImage::new(0, 0),
        RgbImage::new(40, 40),
        RgbImage::from_pixel(40, 40, Rgb([98, 64, 39])),
    ];
    let results = parallel.analyze_batch(images, AnalysisRequest::none().with_tone()).await;
    assert_eq!(results.len(), 4);

    let tone_type = |index: usize| {
        results[index]
            .as_ref()
            .ok()
            .and_then(|r| r.tone.as_ref())
            .map(|t| t.fitzpatrick_type)
    };
    assert_eq!(tone_type(0), Some(4));
    assert!(results[1].as_ref().is_err_and(|e| e.is_image_unreadable()));
    assert_eq!(tone_type(2), Some(0));
    assert_eq!(tone_type(3), Some(6));

    parallel.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn concurrent_stages_match_the_synchronous_pipeline() {
    let image = face_with_mole(3);
    let expected = SkinAnalysisPipeline::default()
        .analyze_complete(&image, AnalysisRequest::all())
        .expect("valid image");

    let parallel = ParallelPipeline::with_workers(SkinAnalysisPipeline::default(), 2);
    let from_single = parallel
        .analyze_complete(Arc::new(image.clone()), AnalysisRequest::all())
        .await
        .expect("valid image");
    let from_batch = parallel.analyze_batch(vec![image], AnalysisRequest::all()).await;

    assert_eq!(from_single, expected);
    assert_eq!(from_batch.into_iter().next().map(|r| r.expect("valid image")), Some(expected));
}
