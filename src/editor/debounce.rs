//! 후행(trailing) 디바운스 타이머.
//!
//! 예약할 때마다 이전 예약을 취소하고, 조용한 구간이 끝난 시점에 한 번만 실행합니다.
//! 타이머 핸들은 `Debouncer`가 소유하며 drop되면 대기 중인 예약도 취소됩니다.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub struct Debouncer {
    delay: Duration,
    runtime: Handle,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    /// `runtime`에서 타이머 태스크를 실행합니다.
    /// 이벤트가 런타임 밖 스레드에서 들어와도 예약할 수 있습니다.
    pub fn new(delay: Duration, runtime: Handle) -> Self {
        Self {
            delay,
            runtime,
            pending: None,
        }
    }

    /// 지금부터 `delay` 뒤에 `fire`를 실행합니다. 대기 중인 예약은 취소됩니다.
    pub fn schedule<F>(&mut self, fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_at(Instant::now() + self.delay, fire);
    }

    /// `deadline`에 `fire`를 실행합니다. 마감 시각은 예약 시점에 고정됩니다.
    pub fn schedule_at<F>(&mut self, deadline: Instant, fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        self.pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            fire();
        }));
    }

    /// 대기 중인 예약을 취소합니다. 취소한 예약이 있었으면 true.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
