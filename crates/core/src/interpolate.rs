//! Recursive binary interpolation driver.
//!
//! The motion model itself is behind the [`MidpointInterpolator`] capability;
//! this module owns the recursion schedule. For each adjacent frame pair
//! `(A, B)` an in-order traversal synthesizes the midpoint, then recurses on
//! `(A, mid)` and `(mid, B)`, yielding exactly `2^depth - 1` frames strictly
//! between `A` and `B` in left-to-right temporal order. Endpoint frames are
//! never yielded.

use std::sync::Arc;

use anyhow::Result;
use ndarray::Array3;

use crate::node::ExecutionContext;

/// Opaque one-step interpolation capability.
///
/// Implemented by the real inference engine ([`FilmModel`](crate::film::FilmModel));
/// tests substitute deterministic stubs.
pub trait MidpointInterpolator {
    /// Synthesize the motion-interpolated frame halfway between `a` and `b`.
    fn midpoint(&self, a: &Array3<f32>, b: &Array3<f32>) -> Result<Array3<f32>>;
}

impl<F> MidpointInterpolator for F
where
    F: Fn(&Array3<f32>, &Array3<f32>) -> Result<Array3<f32>>,
{
    fn midpoint(&self, a: &Array3<f32>, b: &Array3<f32>) -> Result<Array3<f32>> {
        self(a, b)
    }
}

/// Number of frames a full run will synthesize: `(n-1) * (2^depth - 1)`.
pub fn expected_frames(input_len: usize, depth: u32) -> u64 {
    let pairs = input_len.saturating_sub(1) as u64;
    pairs * ((1u64 << depth) - 1)
}

enum Step {
    Segment {
        a: Arc<Array3<f32>>,
        b: Arc<Array3<f32>>,
        depth: u32,
    },
    Emit(Arc<Array3<f32>>),
}

/// Lazy, single-pass producer of synthesized frames for a whole batch.
///
/// Frames are pulled one at a time; each `next()` performs at most one
/// delegate inference. After the first delegate error the iterator fuses.
pub struct InterpolatedFrames<'a, S: ?Sized> {
    synth: &'a S,
    frames: Vec<Arc<Array3<f32>>>,
    depth: u32,
    next_pair: usize,
    stack: Vec<Step>,
    failed: bool,
}

impl<'a, S: MidpointInterpolator + ?Sized> InterpolatedFrames<'a, S> {
    pub fn new(synth: &'a S, frames: &[Array3<f32>], depth: u32) -> Self {
        Self {
            synth,
            frames: frames.iter().map(|f| Arc::new(f.clone())).collect(),
            depth,
            next_pair: 0,
            stack: Vec::new(),
            failed: false,
        }
    }
}

impl<S: MidpointInterpolator + ?Sized> Iterator for InterpolatedFrames<'_, S> {
    type Item = Result<Array3<f32>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            match self.stack.pop() {
                Some(Step::Emit(frame)) => return Some(Ok((*frame).clone())),
                Some(Step::Segment { depth: 0, .. }) => continue,
                Some(Step::Segment { a, b, depth }) => {
                    let mid = match self.synth.midpoint(&a, &b) {
                        Ok(mid) => Arc::new(mid),
                        Err(err) => {
                            self.failed = true;
                            return Some(Err(err));
                        }
                    };

                    // LIFO: the left half is traversed first, then the
                    // midpoint is emitted, then the right half.
                    self.stack.push(Step::Segment {
                        a: mid.clone(),
                        b,
                        depth: depth - 1,
                    });
                    self.stack.push(Step::Emit(mid.clone()));
                    self.stack.push(Step::Segment {
                        a,
                        b: mid,
                        depth: depth - 1,
                    });
                }
                None => {
                    if self.next_pair + 1 >= self.frames.len() {
                        return None;
                    }

                    self.stack.push(Step::Segment {
                        a: self.frames[self.next_pair].clone(),
                        b: self.frames[self.next_pair + 1].clone(),
                        depth: self.depth,
                    });
                    self.next_pair += 1;
                }
            }
        }
    }
}

/// Consume the delegate's frame sequence for `frames` at `depth` levels.
///
/// Per yielded frame: append to the accumulator, poll the host interrupt
/// (the whole call fails with `Cancelled`, discarding accumulated frames),
/// then report one unit of progress. Output order is exactly yield order.
pub fn interpolate_batch<S: MidpointInterpolator + ?Sized>(
    synth: &S,
    frames: &[Array3<f32>],
    depth: u32,
    ctx: &ExecutionContext,
) -> Result<Vec<Array3<f32>>> {
    let mut out = Vec::new();

    for produced in InterpolatedFrames::new(synth, frames, depth) {
        out.push(produced?);
        ctx.check_interrupted()?;
        ctx.report_progress(1);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use anyhow::bail;

    use super::*;
    use crate::error::FlowError;
    use crate::node::{InterruptFlag, ProgressSink};

    fn gray(value: f32) -> Array3<f32> {
        Array3::from_elem((2, 2, 3), value)
    }

    fn averaging(a: &Array3<f32>, b: &Array3<f32>) -> Result<Array3<f32>> {
        Ok((a + b) / 2.0)
    }

    fn first_pixels(frames: &[Array3<f32>]) -> Vec<f32> {
        frames.iter().map(|f| f[[0, 0, 0]]).collect()
    }

    #[test]
    fn test_expected_frames() {
        assert_eq!(expected_frames(3, 1), 2);
        assert_eq!(expected_frames(3, 2), 6);
        assert_eq!(expected_frames(2, 3), 7);
        assert_eq!(expected_frames(1, 4), 0);
        assert_eq!(expected_frames(0, 4), 0);
    }

    #[test]
    fn test_expected_frames_max_depth() {
        // The declared depth ceiling must not overflow.
        assert_eq!(expected_frames(2, 50), (1u64 << 50) - 1);
    }

    #[test]
    fn test_single_pair_depth_one() {
        let frames = vec![gray(0.0), gray(1.0)];
        let ctx = ExecutionContext::default();
        let out = interpolate_batch(&averaging, &frames, 1, &ctx).unwrap();
        assert_eq!(first_pixels(&out), vec![0.5]);
    }

    #[test]
    fn test_temporal_order_depth_two() {
        let frames = vec![gray(0.0), gray(8.0)];
        let ctx = ExecutionContext::default();
        let out = interpolate_batch(&averaging, &frames, 2, &ctx).unwrap();
        // Strictly interior frames, left to right.
        assert_eq!(first_pixels(&out), vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_multi_pair_counts_and_order() {
        let frames = vec![gray(0.0), gray(4.0), gray(8.0)];
        let ctx = ExecutionContext::default();

        let out = interpolate_batch(&averaging, &frames, 1, &ctx).unwrap();
        assert_eq!(first_pixels(&out), vec![2.0, 6.0]);

        let out = interpolate_batch(&averaging, &frames, 2, &ctx).unwrap();
        assert_eq!(out.len(), 6);
        assert_eq!(first_pixels(&out), vec![1.0, 2.0, 3.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_endpoints_never_yielded() {
        let frames = vec![gray(0.0), gray(8.0)];
        let ctx = ExecutionContext::default();
        let out = interpolate_batch(&averaging, &frames, 3, &ctx).unwrap();
        assert_eq!(out.len(), 7);
        for frame in &out {
            let v = frame[[0, 0, 0]];
            assert!(v > 0.0 && v < 8.0, "endpoint value {v} leaked into output");
        }
    }

    #[test]
    fn test_empty_and_singleton_inputs_produce_nothing() {
        let panicking = |_: &Array3<f32>, _: &Array3<f32>| -> Result<Array3<f32>> {
            panic!("delegate must not be invoked");
        };
        let ctx = ExecutionContext::default();

        let out = interpolate_batch(&panicking, &[], 3, &ctx).unwrap();
        assert!(out.is_empty());

        let out = interpolate_batch(&panicking, &[gray(1.0)], 3, &ctx).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_progress_matches_yield_count() {
        let frames = vec![gray(0.0), gray(1.0), gray(2.0)];
        let sink = Arc::new(ProgressSink::new());
        sink.begin(expected_frames(frames.len(), 2));
        let ctx = ExecutionContext {
            progress: Some(sink.clone()),
            interrupt: InterruptFlag::new(),
        };

        let out = interpolate_batch(&averaging, &frames, 2, &ctx).unwrap();
        assert_eq!(out.len(), 6);
        assert_eq!(sink.value(), 6);
        assert_eq!(sink.total(), 6);
    }

    #[test]
    fn test_cancellation_discards_partial_output() {
        // At depth 1 every inference yields immediately, so raising the flag
        // during the k-th inference cancels right after the k-th yield.
        let frames = vec![gray(0.0), gray(2.0), gray(4.0), gray(6.0)];
        let sink = Arc::new(ProgressSink::new());
        sink.begin(expected_frames(frames.len(), 1));
        let ctx = ExecutionContext {
            progress: Some(sink.clone()),
            interrupt: InterruptFlag::new(),
        };

        let calls = AtomicUsize::new(0);
        let interrupt = ctx.interrupt.clone();
        let cancelling = move |a: &Array3<f32>, b: &Array3<f32>| -> Result<Array3<f32>> {
            if calls.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
                interrupt.raise();
            }
            averaging(a, b)
        };

        let err = interpolate_batch(&cancelling, &frames, 1, &ctx)
            .err()
            .expect("run should be cancelled");
        assert!(matches!(
            err.downcast_ref::<FlowError>(),
            Some(FlowError::Cancelled)
        ));
        // The interrupt is polled before the progress report for the frame.
        assert_eq!(sink.value(), 1);
    }

    #[test]
    fn test_cancellation_before_first_yield() {
        let frames = vec![gray(0.0), gray(1.0)];
        let ctx = ExecutionContext::default();
        ctx.interrupt.raise();

        let err = interpolate_batch(&averaging, &frames, 1, &ctx)
            .err()
            .expect("run should be cancelled");
        assert!(matches!(
            err.downcast_ref::<FlowError>(),
            Some(FlowError::Cancelled)
        ));
    }

    #[test]
    fn test_delegate_error_propagates_and_fuses() {
        let failing = |_: &Array3<f32>, _: &Array3<f32>| -> Result<Array3<f32>> {
            bail!("inference engine exploded")
        };

        let frames = vec![gray(0.0), gray(1.0)];
        let mut iter = InterpolatedFrames::new(&failing, &frames, 2);
        let first = iter.next().expect("first pull should surface the error");
        assert!(first
            .err()
            .expect("should be an error")
            .to_string()
            .contains("inference engine exploded"));
        assert!(iter.next().is_none(), "iterator must fuse after an error");
    }

    #[test]
    fn test_lazy_one_inference_per_pull() {
        let calls = AtomicUsize::new(0);
        let counting = |a: &Array3<f32>, b: &Array3<f32>| -> Result<Array3<f32>> {
            calls.fetch_add(1, Ordering::SeqCst);
            averaging(a, b)
        };

        let frames = vec![gray(0.0), gray(8.0)];
        let mut iter = InterpolatedFrames::new(&counting, &frames, 2);

        // In-order traversal: the first yielded frame requires walking down
        // the left spine (two inferences), each later pull at most one more.
        iter.next().unwrap().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        iter.next().unwrap().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        iter.next().unwrap().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(iter.next().is_none());
    }
}
