use rand::Rng;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::errors::AppError;

/// 待機処理が返す Future
pub type SleepFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// 待機処理。テストでは実時間を待たない実装を注入する
pub type Sleeper = Arc<dyn Fn(Duration) -> SleepFuture + Send + Sync>;

/// リトライ戦略
#[derive(Debug, Clone, PartialEq)]
pub struct RetryStrategy {
    /// 最大試行回数（初回を含む）
    pub max_attempts: u32,
    /// 初期遅延時間
    pub initial_delay: Duration,
    /// 最大遅延時間
    pub max_delay: Duration,
    /// バックオフ倍率（1.0 なら固定間隔）
    pub backoff_multiplier: f64,
    /// ジッター追加フラグ
    pub add_jitter: bool,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

/// リトライ実行結果
#[derive(Debug)]
pub enum RetryResult<T> {
    /// 成功
    Success(T),
    /// 最大試行回数に達して失敗（最後のエラーを保持）
    MaxAttemptsReached(AppError),
    /// リトライ不可能なエラーで失敗
    NonRetryable(AppError),
}

impl<T> RetryResult<T> {
    pub fn into_result(self) -> Result<T, AppError> {
        match self {
            RetryResult::Success(value) => Ok(value),
            RetryResult::MaxAttemptsReached(error) | RetryResult::NonRetryable(error) => Err(error),
        }
    }
}

/// リトライ実行器
#[derive(Clone)]
pub struct RetryExecutor {
    strategy: RetryStrategy,
    sleeper: Sleeper,
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryStrategy::default())
    }
}

impl RetryExecutor {
    /// 新しいリトライ実行器を作成（待機は tokio のタイマー）
    pub fn new(strategy: RetryStrategy) -> Self {
        Self {
            strategy,
            sleeper: Arc::new(|delay: Duration| -> SleepFuture { Box::pin(tokio::time::sleep(delay)) }),
        }
    }

    /// 指数バックオフ設定でリトライ実行器を作成
    pub fn exponential_backoff(max_attempts: u32, initial_delay: Duration) -> Self {
        Self::new(RetryStrategy {
            max_attempts,
            initial_delay,
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            add_jitter: true,
        })
    }

    /// 固定間隔設定でリトライ実行器を作成
    pub fn fixed_interval(max_attempts: u32, interval: Duration) -> Self {
        Self::new(RetryStrategy {
            max_attempts,
            initial_delay: interval,
            max_delay: interval,
            backoff_multiplier: 1.0,
            add_jitter: false,
        })
    }

    /// 待機処理を差し替える
    pub fn with_sleeper<F>(mut self, sleeper: F) -> Self
    where
        F: Fn(Duration) -> SleepFuture + Send + Sync + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// 試行回数だけを差し替える
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.strategy.max_attempts = max_attempts;
        self
    }

    pub fn strategy(&self) -> &RetryStrategy {
        &self.strategy
    }

    /// リトライ可能なエラー（`AppError::is_retryable`）のみ再試行する
    pub async fn execute<F, Fut, T>(&self, operation: F) -> RetryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        self.execute_if(operation, AppError::is_retryable).await
    }

    /// `should_retry` が true を返すエラーを再試行する
    pub async fn execute_if<F, Fut, T, P>(&self, mut operation: F, should_retry: P) -> RetryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
        P: Fn(&AppError) -> bool,
    {
        let max_attempts = self.strategy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!("Executing operation, attempt {}/{}", attempt, max_attempts);

            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!("Operation succeeded after {} attempts", attempt);
                    }
                    return RetryResult::Success(result);
                }
                Err(error) => {
                    if !should_retry(&error) {
                        warn!("Non-retryable error encountered: {}", error);
                        return RetryResult::NonRetryable(error);
                    }

                    if attempt >= max_attempts {
                        error!("Max attempts ({}) reached, giving up: {}", max_attempts, error);
                        return RetryResult::MaxAttemptsReached(error);
                    }

                    let delay = self.calculate_delay(attempt);
                    warn!(
                        "Operation failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt, max_attempts, delay, error
                    );

                    (self.sleeper)(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// 遅延時間を計算
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = if self.strategy.backoff_multiplier == 1.0 {
            // 固定間隔
            self.strategy.initial_delay
        } else {
            // 指数バックオフ
            let multiplier = self
                .strategy
                .backoff_multiplier
                .powi(attempt.saturating_sub(1) as i32);
            Duration::from_millis((self.strategy.initial_delay.as_millis() as f64 * multiplier) as u64)
        };

        // 最大遅延時間でクランプ
        let delay = std::cmp::min(base_delay, self.strategy.max_delay);

        if self.strategy.add_jitter {
            self.add_jitter(delay)
        } else {
            delay
        }
    }

    /// ジッターを追加（±25%のランダム変動）
    fn add_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::thread_rng();
        let jitter_factor = rng.gen_range(0.75..=1.25);
        Duration::from_millis((delay.as_millis() as f64 * jitter_factor) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn recording_sleeper(log: Arc<Mutex<Vec<Duration>>>) -> impl Fn(Duration) -> SleepFuture {
        move |delay: Duration| -> SleepFuture {
            log.lock().unwrap().push(delay);
            Box::pin(async {})
        }
    }

    #[tokio::test]
    async fn test_retry_success_on_first_attempt() {
        let executor = RetryExecutor::default();
        let result = executor.execute(|| async { Ok::<i32, AppError>(42) }).await;

        match result {
            RetryResult::Success(value) => assert_eq!(value, 42),
            _ => panic!("Expected success"),
        }
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();
        let delays = Arc::new(Mutex::new(Vec::new()));

        let executor = RetryExecutor::default().with_sleeper(recording_sleeper(delays.clone()));
        let result = executor
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    let current = count.fetch_add(1, Ordering::SeqCst) + 1;
                    if current < 3 {
                        Err(AppError::ServiceUnavailable("Temporary failure".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        match result {
            RetryResult::Success(value) => {
                assert_eq!(value, 42);
                assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
                assert_eq!(delays.lock().unwrap().len(), 2);
            }
            _ => panic!("Expected success after retries"),
        }
    }

    #[tokio::test]
    async fn test_non_retryable_error() {
        let executor = RetryExecutor::default();
        let result = executor
            .execute(|| async {
                Err::<i32, AppError>(AppError::Validation("Invalid input".to_string()))
            })
            .await;

        match result {
            RetryResult::NonRetryable(_) => {}
            _ => panic!("Expected non-retryable error"),
        }
    }

    #[tokio::test]
    async fn test_fixed_interval_retries_everything_when_asked() {
        let attempts = Arc::new(AtomicU32::new(0));
        let delays = Arc::new(Mutex::new(Vec::new()));
        let executor = RetryExecutor::fixed_interval(3, Duration::from_millis(1000))
            .with_sleeper(recording_sleeper(delays.clone()));

        let result = executor
            .execute_if(
                || {
                    let attempts = attempts.clone();
                    async move {
                        let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                        Err::<(), AppError>(AppError::Authentication(format!("attempt {}", n)))
                    }
                },
                |_| true,
            )
            .await;

        match result {
            RetryResult::MaxAttemptsReached(AppError::Authentication(message)) => {
                assert_eq!(message, "attempt 3");
            }
            other => panic!("Expected last failure, got {:?}", other),
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(
            *delays.lock().unwrap(),
            vec![Duration::from_millis(1000), Duration::from_millis(1000)]
        );
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let executor = RetryExecutor::fixed_interval(0, Duration::from_millis(1));
        let result = executor.execute(|| async { Ok::<_, AppError>("once") }).await;
        assert_eq!(result.into_result().unwrap(), "once");
    }

    #[test]
    fn test_delay_calculation() {
        let executor_no_jitter = RetryExecutor::new(RetryStrategy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            backoff_multiplier: 2.0,
            add_jitter: false,
        });

        assert_eq!(executor_no_jitter.calculate_delay(1), Duration::from_millis(100));
        assert_eq!(executor_no_jitter.calculate_delay(2), Duration::from_millis(200));
        // 最大遅延でクランプ
        assert_eq!(executor_no_jitter.calculate_delay(3), Duration::from_millis(300));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let executor = RetryExecutor::exponential_backoff(3, Duration::from_millis(1000));
        for _ in 0..50 {
            let delay = executor.calculate_delay(1);
            assert!(delay >= Duration::from_millis(750) && delay <= Duration::from_millis(1250));
        }
    }
}
