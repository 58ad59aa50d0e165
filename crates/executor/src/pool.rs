//! Bounded, lazily-populated pool of renderer handles.
//!
//! The pool owns every renderer it creates. Renderers are built on demand up
//! to the configured capacity, lent out one caller at a time, and torn down
//! when the pool is closed.
//!
//! All bookkeeping (`created`, the idle queue and the closed latch) lives
//! behind a single mutex. Renderer construction happens outside that lock so
//! a slow engine launch never stalls unrelated acquire/release traffic.

use log::{debug, info, warn};
use quire_traits::{RenderError, Renderer, RendererFactory};
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::Notify;

/// Error type for pool operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Renderer pool is closed")]
    Closed,

    #[error("Failed to construct renderer: {0}")]
    Construction(RenderError),

    #[error("Failed to tear down renderer: {0}")]
    Teardown(RenderError),
}

struct PoolState<R> {
    created: usize,
    idle: VecDeque<R>,
    closed: bool,
}

/// A bounded pool of renderers created lazily by a [`RendererFactory`].
///
/// The pool is meant to be shared behind an `Arc`; [`RendererPool::acquire`]
/// hands out a [`PooledRenderer`] guard that returns the renderer when
/// dropped.
///
/// # Example
///
/// ```ignore
/// let pool = Arc::new(RendererPool::new(ChromeRendererFactory::new(settings), 4));
/// {
///     let mut renderer = pool.acquire().await?;
///     renderer.render(request).await?;
/// } // returned to the pool here
/// pool.close().await?;
/// ```
pub struct RendererPool<F: RendererFactory> {
    factory: F,
    capacity: usize,
    state: Mutex<PoolState<F::Renderer>>,
    returned: Notify,
}

impl<F: RendererFactory> RendererPool<F> {
    /// Creates an empty pool. No renderer is built until the first acquire.
    ///
    /// A capacity of zero is treated as one; choosing an automatic size is
    /// the caller's job.
    pub fn new(factory: F, capacity: usize) -> Self {
        Self {
            factory,
            capacity: capacity.max(1),
            state: Mutex::new(PoolState {
                created: 0,
                idle: VecDeque::with_capacity(capacity.max(1)),
                closed: false,
            }),
            returned: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState<F::Renderer>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configured capacity (not current utilisation).
    pub fn size(&self) -> usize {
        self.capacity
    }

    /// Number of renderers constructed so far and still accounted for.
    pub fn created(&self) -> usize {
        self.lock().created
    }

    /// Number of renderers currently waiting in the pool.
    pub fn idle(&self) -> usize {
        self.lock().idle.len()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Borrows a renderer, building one if the pool has spare capacity.
    ///
    /// Waits for a release when every renderer is in use. A construction
    /// failure is returned to this caller only and is not retried; the
    /// capacity it had reserved becomes available to the next acquirer, as it
    /// does when the caller stops waiting while construction is in progress.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledRenderer<F>, PoolError> {
        let reservation = loop {
            // Enabled before inspecting the state so a release between the
            // check and the await is not missed.
            let mut returned = pin!(self.returned.notified());
            returned.as_mut().enable();
            {
                let mut state = self.lock();
                if state.closed {
                    return Err(PoolError::Closed);
                }
                if let Some(renderer) = state.idle.pop_front() {
                    return Ok(PooledRenderer::new(Arc::clone(self), renderer));
                }
                if state.created < self.capacity {
                    state.created += 1;
                    break Reservation::new(self);
                }
            }
            returned.await;
        };

        debug!("[POOL] Constructing renderer via {}.", self.factory.name());
        match self.factory.create().await {
            Ok(renderer) => {
                reservation.keep();
                let closed = self.lock().closed;
                if closed {
                    debug!("[POOL] Pool closed during construction; tearing renderer down.");
                    if let Err(e) = renderer.shutdown().await {
                        warn!("[POOL] Teardown of late renderer failed: {}", e);
                    }
                    return Err(PoolError::Closed);
                }
                Ok(PooledRenderer::new(Arc::clone(self), renderer))
            }
            Err(e) => {
                drop(reservation);
                warn!("[POOL] Renderer construction failed: {}", e);
                Err(PoolError::Construction(e))
            }
        }
    }

    /// Returns a renderer to the idle set.
    ///
    /// After [`RendererPool::close`] the renderer is dropped instead, which
    /// releases its engine.
    pub fn release(&self, renderer: F::Renderer) {
        let mut state = self.lock();
        if state.closed {
            drop(state);
            debug!("[POOL] Release after close; dropping renderer.");
            drop(renderer);
            return;
        }
        state.idle.push_back(renderer);
        drop(state);
        self.returned.notify_one();
    }

    /// Closes the pool and tears down every idle renderer.
    ///
    /// Only the first call does any work; later calls return `Ok(())`.
    /// Teardown continues past failures and the last one is returned.
    /// Renderers still on loan are dropped when they come back.
    pub async fn close(&self) -> Result<(), PoolError> {
        let drained: Vec<F::Renderer> = {
            let mut state = self.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.idle.drain(..).collect()
        };
        self.returned.notify_waiters();

        info!(
            "[POOL] Closing {} pool: tearing down {} idle renderer(s).",
            self.factory.name(),
            drained.len()
        );

        let mut last_error = None;
        for renderer in drained {
            if let Err(e) = renderer.shutdown().await {
                warn!("[POOL] Renderer teardown failed: {}", e);
                last_error = Some(e);
            }
        }

        match last_error {
            Some(e) => Err(PoolError::Teardown(e)),
            None => Ok(()),
        }
    }
}

/// Capacity claimed for a renderer under construction.
///
/// Dropped without [`Reservation::keep`], it gives the slot back and wakes one
/// waiter. This covers failed constructions and acquire futures dropped
/// mid-construction alike.
struct Reservation<'a, F: RendererFactory> {
    pool: &'a RendererPool<F>,
    armed: bool,
}

impl<'a, F: RendererFactory> Reservation<'a, F> {
    fn new(pool: &'a RendererPool<F>) -> Self {
        Self { pool, armed: true }
    }

    /// The renderer was built; the slot now belongs to it.
    fn keep(mut self) {
        self.armed = false;
    }
}

impl<F: RendererFactory> Drop for Reservation<'_, F> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.pool.lock().created -= 1;
        self.pool.returned.notify_one();
    }
}

/// A renderer on loan from a [`RendererPool`].
///
/// Dereferences to the renderer and gives it back to the pool when dropped.
/// A guard dropped during a panic discards its renderer instead, since the
/// engine may have been left mid-operation.
pub struct PooledRenderer<F: RendererFactory> {
    pool: Arc<RendererPool<F>>,
    renderer: Option<F::Renderer>,
}

impl<F: RendererFactory> PooledRenderer<F> {
    fn new(pool: Arc<RendererPool<F>>, renderer: F::Renderer) -> Self {
        Self {
            pool,
            renderer: Some(renderer),
        }
    }
}

impl<F: RendererFactory> Deref for PooledRenderer<F> {
    type Target = F::Renderer;

    fn deref(&self) -> &Self::Target {
        self.renderer.as_ref().expect("renderer present until drop")
    }
}

impl<F: RendererFactory> DerefMut for PooledRenderer<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.renderer.as_mut().expect("renderer present until drop")
    }
}

impl<F: RendererFactory> Drop for PooledRenderer<F> {
    fn drop(&mut self) {
        let Some(renderer) = self.renderer.take() else {
            return;
        };
        if std::thread::panicking() {
            warn!("[POOL] Holder panicked; discarding its renderer.");
            {
                let mut state = self.pool.lock();
                state.created = state.created.saturating_sub(1);
            }
            drop(renderer);
            self.pool.returned.notify_one();
        } else {
            self.pool.release(renderer);
        }
    }
}
