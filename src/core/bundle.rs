//! Configuration bound onto a user struct, with live field refresh.

use crate::core::schema::{Bind, FieldDescriptor, FieldKind, LeafValue, Schema};
use crate::core::{ConfigClient, Options};
use crate::error::Result;
use crate::notify::Subscription;
use arc_swap::ArcSwap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A struct populated from configuration.
///
/// Every field described by [`Bind`] is resolved once when the bundle is
/// created; fields whose key is absent keep their `Default` value. Fields
/// tagged `watch` are then kept up to date: each change notification
/// re-resolves the key through the client and publishes a new copy of the
/// struct.
///
/// Reads are lock-free: [`get`](Self::get) returns an `Arc` snapshot that never
/// changes under the reader.
///
/// # Examples
///
/// ```rust,no_run
/// use tiered_config::prelude::*;
///
/// #[derive(Debug, Default, Clone)]
/// struct RestConfig {
///     string_property: String,
///     boolean_property: bool,
///     integer_property: i32,
/// }
///
/// impl Bind for RestConfig {
///     fn bind(schema: &mut Schema<Self>) {
///         schema
///             .field("StringProperty", "string-property", |c: &mut RestConfig| &mut c.string_property)
///             .field("BooleanProperty", "boolean-property,watch", |c: &mut RestConfig| &mut c.boolean_property)
///             .field("IntegerProperty", "integer-property", |c: &mut RestConfig| &mut c.integer_property);
///     }
/// }
///
/// # async fn example() -> Result<()> {
/// let bundle = Bundle::<RestConfig>::new("rest-config", Options::default()).await?;
/// println!("maintenance: {}", bundle.get().boolean_property);
/// # Ok(())
/// # }
/// ```
pub struct Bundle<T: Bind> {
    prefix: String,
    current: Arc<ArcSwap<T>>,
    client: ConfigClient,
    subscriptions: Vec<Subscription>,
}

impl<T: Bind> Bundle<T> {
    /// Build a client from `options` and bind `T` under `prefix`.
    ///
    /// # Errors
    ///
    /// Fails only if the client cannot be built.
    pub async fn new(prefix: impl Into<String>, options: Options) -> Result<Self> {
        let client = ConfigClient::new(options).await?;
        Ok(Self::with_client(prefix, client).await)
    }

    /// Bind `T` under `prefix` using an existing client.
    ///
    /// Must be called from within a Tokio runtime when `T` has watched fields.
    pub async fn with_client(prefix: impl Into<String>, client: ConfigClient) -> Self {
        let prefix = prefix.into();
        let schema = Schema::<T>::of();

        let mut value = T::default();
        for field in schema.fields() {
            let key = field.key(&prefix);
            if let Some(resolved) = resolve(&client, field, &key).await {
                assign(field, &key, &mut value, resolved);
            }
        }

        let current = Arc::new(ArcSwap::from_pointee(value));
        let subscriptions = schema
            .fields()
            .iter()
            .filter(|field| field.is_watched() && !matches!(field.kind(), FieldKind::Unsupported(_)))
            .map(|field| refresh_on_change(&client, &current, field.clone(), field.key(&prefix)))
            .collect();

        Self {
            prefix,
            current,
            client,
            subscriptions,
        }
    }

    /// The current value.
    pub fn get(&self) -> Arc<T> {
        self.current.load_full()
    }

    /// Key prefix the struct is bound under.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The client fields are resolved through.
    pub fn client(&self) -> &ConfigClient {
        &self.client
    }

    /// Watch subscriptions for the live fields, one per field.
    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Stop refreshing live fields. The last value stays readable.
    pub async fn shutdown(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.shutdown().await;
        }
    }
}

/// Resolve a field's key with the getter matching its kind.
async fn resolve<T>(client: &ConfigClient, field: &FieldDescriptor<T>, key: &str) -> Option<LeafValue> {
    match field.kind() {
        FieldKind::Bool => client.get_bool(key).await.map(LeafValue::Bool),
        FieldKind::String => client.get_string(key).await.map(LeafValue::String),
        FieldKind::Int => client.get_int(key).await.map(LeafValue::Int),
        FieldKind::Float => client.get_float(key).await.map(LeafValue::Float),
        FieldKind::Unsupported(type_name) => {
            warn!("Field {} has unsupported type {}, skipping", key, type_name);
            None
        }
    }
}

fn assign<T>(field: &FieldDescriptor<T>, key: &str, target: &mut T, value: LeafValue) {
    let shown = format!("{:?}", value);
    if !field.apply(target, value) {
        warn!("Value {} for {} does not fit the field type, skipping", shown, key);
    }
}

/// Re-resolve a watched field on every change notification and publish it.
///
/// Notifications go through a queue drained by one task, so refreshes of a
/// field never overlap. The task ends once every watch of the field has stopped.
fn refresh_on_change<T: Bind>(
    client: &ConfigClient,
    current: &Arc<ArcSwap<T>>,
    field: FieldDescriptor<T>,
    key: String,
) -> Subscription {
    let (tx, mut rx) = mpsc::unbounded_channel::<()>();
    let subscription = client.subscribe(&key, move |_, _| {
        let _ = tx.send(());
    });

    let client = client.clone();
    let current = Arc::clone(current);
    tokio::spawn(async move {
        while rx.recv().await.is_some() {
            let Some(value) = resolve(&client, &field, &key).await else {
                continue;
            };
            debug!("Refreshing {} with {:?}", key, value);

            current.rcu(|old| {
                let mut next = T::clone(old);
                assign(&field, &key, &mut next, value.clone());
                next
            });
        }
    });

    subscription
}
