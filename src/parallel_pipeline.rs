// THEORY:
// The async façade over `SkinAnalysisPipeline`. Every analysis is a pure,
// CPU-bound function of its image, so parallelism needs no coordination beyond
// handing each job its own image and the shared, read-only pipeline.
//
// Two levels of parallelism are offered:
// 1.  **Within one image**: `analyze_complete` runs the condition, lesion and
//     tone analyses as three blocking tasks and joins them.
// 2.  **Across images**: `analyze_batch` feeds a fixed pool of workers through a
//     round-robin dispatcher. Each worker handles one image at a time, so at
//     most `workers` analyses are in flight, and results come back in input
//     order because the caller awaits the per-job reply channels in that order.
//
// CPU work always runs on tokio's blocking pool, never on the async worker
// threads. The one-time model load happens on the blocking pool as well.

use crate::core_modules::condition::SkinConditionResult;
use crate::core_modules::frame::Frame;
use crate::core_modules::lesion::LesionAnalysisResult;
use crate::core_modules::tone::SkinToneResult;
use crate::error::{AnalysisError, Result};
use crate::pipeline::{AnalysisRequest, CompleteAnalysisResult, SkinAnalysisPipeline};
use futures::future;
use image::RgbImage;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

fn worker_error(error: JoinError) -> AnalysisError {
    AnalysisError::Worker(error.to_string())
}

/// Runs one blocking analysis on tokio's blocking pool.
async fn run_blocking<T, F>(job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(job).await.map_err(worker_error)?
}

/// Keeps a successful stage result, logs and drops a failed one.
fn keep_or_warn<T>(stage: &'static str, outcome: Result<T>) -> Option<T> {
    match outcome {
        Ok(result) => Some(result),
        Err(error) => {
            warn!(stage, %error, "analysis stage failed, omitting it from the result");
            None
        }
    }
}

pub struct AnalysisTask {
    pub job_id: u64,
    pub image: Arc<RgbImage>,
    pub request: AnalysisRequest,
    pub result_sender: oneshot::Sender<Result<CompleteAnalysisResult>>,
}

pub struct WorkerPool {
    task_sender: mpsc::UnboundedSender<AnalysisTask>,
    workers: Vec<JoinHandle<()>>,
    dispatcher: JoinHandle<()>,
}

impl WorkerPool {
    /// Must be called from within a tokio runtime.
    pub fn new(pipeline: Arc<SkinAnalysisPipeline>, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<AnalysisTask>();

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|_| mpsc::unbounded_channel::<AnalysisTask>())
            .unzip();

        // Round-robin dispatcher.
        let dispatcher = tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                if worker_senders[worker_idx].send(task).is_err() {
                    warn!(worker_idx, "analysis worker is gone, dropping task");
                }
                worker_idx = (worker_idx + 1) % worker_count;
            }
        });

        let workers = worker_receivers
            .into_iter()
            .enumerate()
            .map(|(worker_idx, mut worker_receiver)| {
                let pipeline = pipeline.clone();
                tokio::spawn(async move {
                    while let Some(task) = worker_receiver.recv().await {
                        debug!(worker_idx, job_id = task.job_id, "analysis started");
                        let pipeline = pipeline.clone();
                        let image = task.image;
                        let request = task.request;
                        let outcome =
                            run_blocking(move || pipeline.analyze_complete(&image, request)).await;
                        // The caller may have stopped waiting.
                        let _ = task.result_sender.send(outcome);
                    }
                })
            })
            .collect();

        Self {
            task_sender,
            workers,
            dispatcher,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queues one image and returns the channel its result will arrive on.
    pub fn submit(
        &self,
        job_id: u64,
        image: Arc<RgbImage>,
        request: AnalysisRequest,
    ) -> Result<oneshot::Receiver<Result<CompleteAnalysisResult>>> {
        let (result_sender, result_receiver) = oneshot::channel();
        let task = AnalysisTask {
            job_id,
            image,
            request,
            result_sender,
        };
        self.task_sender
            .send(task)
            .map_err(|_| AnalysisError::Worker("worker pool is shut down".into()))?;
        Ok(result_receiver)
    }

    /// Stops accepting work and waits for queued jobs to finish.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.task_sender);
        self.dispatcher.await.map_err(worker_error)?;
        for worker in self.workers {
            worker.await.map_err(worker_error)?;
        }
        Ok(())
    }
}

pub struct ParallelPipeline {
    pipeline: Arc<SkinAnalysisPipeline>,
    worker_pool: WorkerPool,
}

impl ParallelPipeline {
    /// A pool with one worker per logical CPU. Must be called from within a tokio runtime.
    pub fn new(pipeline: SkinAnalysisPipeline) -> Self {
        Self::with_workers(pipeline, num_cpus::get())
    }

    pub fn with_workers(pipeline: SkinAnalysisPipeline, workers: usize) -> Self {
        let pipeline = Arc::new(pipeline);
        let worker_pool = WorkerPool::new(pipeline.clone(), workers);
        Self { pipeline, worker_pool }
    }

    pub fn pipeline(&self) -> &SkinAnalysisPipeline {
        &self.pipeline
    }

    pub fn worker_count(&self) -> usize {
        self.worker_pool.worker_count()
    }

    /// Loads the lesion model, if any, off the async threads.
    pub async fn warm_up_model(&self) -> Result<bool> {
        let pipeline = self.pipeline.clone();
        run_blocking(move || Ok(pipeline.warm_up_model())).await
    }

    /// Runs the requested analyses of one image concurrently.
    pub async fn analyze_complete(
        &self,
        image: Arc<RgbImage>,
        request: AnalysisRequest,
    ) -> Result<CompleteAnalysisResult> {
        Frame::new(&image)?;

        let condition = {
            let (pipeline, image) = (self.pipeline.clone(), image.clone());
            async move {
                if !request.condition {
                    return Ok(None);
                }
                let outcome: Result<SkinConditionResult> =
                    run_blocking(move || pipeline.analyze_condition(&image)).await;
                Self::stage_outcome("condition", outcome)
            }
        };
        let lesions = {
            let (pipeline, image) = (self.pipeline.clone(), image.clone());
            async move {
                if !request.lesions {
                    return Ok(None);
                }
                let outcome: Result<LesionAnalysisResult> =
                    run_blocking(move || pipeline.analyze_lesions(&image)).await;
                Self::stage_outcome("lesions", outcome)
            }
        };
        let tone = {
            let (pipeline, image) = (self.pipeline.clone(), image);
            async move {
                if !request.tone {
                    return Ok(None);
                }
                let outcome: Result<SkinToneResult> =
                    run_blocking(move || pipeline.analyze_tone(&image)).await;
                Self::stage_outcome("tone", outcome)
            }
        };

        let (condition, lesions, tone) = future::try_join3(condition, lesions, tone).await?;
        Ok(CompleteAnalysisResult::from_parts(condition, lesions, tone))
    }

    /// Analyses every image on the worker pool. Results are in input order;
    /// one unreadable image does not affect the others.
    pub async fn analyze_batch(
        &self,
        images: Vec<RgbImage>,
        request: AnalysisRequest,
    ) -> Vec<Result<CompleteAnalysisResult>> {
        let replies = images
            .into_iter()
            .enumerate()
            .map(|(job_id, image)| self.worker_pool.submit(job_id as u64, Arc::new(image), request));

        let pending = replies.map(|reply| async move {
            match reply {
                Ok(receiver) => receiver
                    .await
                    .unwrap_or_else(|_| Err(AnalysisError::Worker("analysis worker dropped the job".into()))),
                Err(error) => Err(error),
            }
        });
        future::join_all(pending).await
    }

    pub async fn shutdown(self) -> Result<()> {
        self.worker_pool.shutdown().await
    }

    /// Worker failures are fatal; any other stage error is logged and omitted.
    fn stage_outcome<T>(stage: &'static str, outcome: Result<T>) -> Result<Option<T>> {
        match outcome {
            Err(AnalysisError::Worker(message)) => Err(AnalysisError::Worker(message)),
            other => Ok(keep_or_warn(stage, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[tokio::test]
    async fn worker_count_has_a_floor_of_one() {
        let parallel = ParallelPipeline::with_workers(SkinAnalysisPipeline::default(), 0);
        assert_eq!(parallel.worker_count(), 1);
        parallel.shutdown().await.expect("clean shutdown");
    }

    #[tokio::test]
    async fn concurrent_result_matches_sequential() {
        let image = RgbImage::from_pixel(48, 48, Rgb([200, 160, 125]));
        let sequential = SkinAnalysisPipeline::default()
            .analyze_complete(&image, AnalysisRequest::all())
            .expect("valid image");

        let parallel = ParallelPipeline::with_workers(SkinAnalysisPipeline::default(), 2);
        let concurrent = parallel
            .analyze_complete(Arc::new(image), AnalysisRequest::all())
            .await
            .expect("valid image");
        assert_eq!(concurrent, sequential);
    }

    #[tokio::test]
    async fn zero_area_image_is_rejected_before_any_stage() {
        let parallel = ParallelPipeline::with_workers(SkinAnalysisPipeline::default(), 1);
        let error = parallel
            .analyze_complete(Arc::new(RgbImage::new(0, 0)), AnalysisRequest::all())
            .await
            .unwrap_err();
        assert!(error.is_image_unreadable());
    }
}
