//! Construction context handed to factories
//!
//! A [`Context`] is supplied once when the container is created and reaches
//! every factory through [`Resolver::context`](crate::Resolver::context).
//! Each factory invocation additionally gets its own [`CancellationToken`],
//! a child of the context token, which the container cancels when the
//! invocation is abandoned after a timeout.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cooperative cancellation signal.
///
/// Cancelling a token cancels every child created from it. Factories that
/// can block for long should poll [`is_cancelled`](Self::is_cancelled).
///
/// ```rust
/// use graph_injector::CancellationToken;
///
/// let parent = CancellationToken::new();
/// let child = parent.child_token();
///
/// parent.cancel();
/// assert!(child.is_cancelled());
/// ```
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    cancelled: AtomicBool,
    parent: Option<CancellationToken>,
    created_at: Instant,
}

impl CancellationToken {
    /// Create a new root token
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                parent: None,
                created_at: Instant::now(),
            }),
        }
    }

    /// Create a token that is cancelled with this one, but can also be
    /// cancelled on its own
    pub fn child_token(&self) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                parent: Some(self.clone()),
                created_at: Instant::now(),
            }),
        }
    }

    /// Signal cancellation
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    /// Returns true if this token or any ancestor was cancelled
    pub fn is_cancelled(&self) -> bool {
        let mut current = Some(self);
        while let Some(token) = current {
            if token.inner.cancelled.load(Ordering::Acquire) {
                return true;
            }
            current = token.inner.parent.as_ref();
        }
        false
    }

    /// Time since the token was created
    pub fn elapsed(&self) -> Duration {
        self.inner.created_at.elapsed()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}

/// Container-wide construction context.
///
/// # Examples
///
/// ```rust
/// use graph_injector::{Container, Context};
///
/// #[derive(Clone)]
/// struct Banner(String);
///
/// let container = Container::with_context(Context::new("billing-api"));
/// container.register_factory(|r| Banner(format!("{} ready", r.context().name())));
///
/// assert_eq!(container.get::<Banner>().unwrap().0, "billing-api ready");
/// ```
#[derive(Clone, Debug)]
pub struct Context {
    name: Arc<str>,
    token: CancellationToken,
}

impl Context {
    /// Create a context with its own root cancellation token
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            token: CancellationToken::new(),
        }
    }

    /// Use an existing token as the root of all factory tokens
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Name used to label log output
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root cancellation token
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancel the root token and with it every in-flight factory token
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the root token was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new("default")
    }
}
