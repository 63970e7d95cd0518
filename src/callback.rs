use std::fmt::Debug;
use std::ops::Deref;
use std::sync::Arc;

pub(crate) type Callback<I> = dyn Fn(I) + 'static + Sync + Send;

/// A cloneable, optionally-set user callback.
#[derive(Clone)]
pub(crate) struct OptionalCallback<I> {
    inner: Arc<Option<Box<Callback<I>>>>,
}

impl<I> OptionalCallback<I> {
    pub(crate) fn new<T>(callback: T) -> Self
    where
        T: Fn(I) + 'static + Sync + Send,
    {
        OptionalCallback {
            inner: Arc::new(Some(Box::new(callback))),
        }
    }
}

impl<I> Default for OptionalCallback<I> {
    fn default() -> Self {
        OptionalCallback {
            inner: Arc::new(None),
        }
    }
}

impl<I> Debug for OptionalCallback<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.inner.is_some() {
            f.write_fmt(format_args!("Callback(Fn({}))", std::any::type_name::<I>()))
        } else {
            f.write_str("Callback(None)")
        }
    }
}

impl<I> Deref for OptionalCallback<I> {
    type Target = Option<Box<Callback<I>>>;
    fn deref(&self) -> &<Self as std::ops::Deref>::Target {
        self.inner.as_ref()
    }
}
