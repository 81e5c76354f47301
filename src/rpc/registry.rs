//! Service registry mapping `Service.Method` names to typed handlers
//!
//! Each service lists its callable operations in a [`MethodTable`]. A method is
//! any `Fn(&S, A, &mut R) -> Result<(), E>` where the argument decodes from
//! JSON, the reply slot has a default and encodes to JSON, and the error can be
//! displayed. The registry is built before serving and never mutated after.

use std::{any::type_name, collections::HashMap, fmt, fmt::Display, sync::Arc};

use serde::{de::DeserializeOwned, de::Error as _, Serialize};
use serde_json::Value;

use crate::errors::{DispatchError, RegistrationError};

type Binder<S> =
    Arc<dyn Fn(Arc<S>, Option<&str>) -> Result<PreparedCall, DispatchError> + Send + Sync>;
type ErasedBinder =
    Box<dyn Fn(Option<&str>) -> Result<PreparedCall, DispatchError> + Send + Sync>;

/// A remotely callable type. Implementors list their methods once; the
/// registry wires them to a shared receiver instance.
pub trait Service: Send + Sync + Sized + 'static {
    fn methods(table: &mut MethodTable<Self>);
}

struct TableEntry<S> {
    name: String,
    argument_shape: &'static str,
    reply_shape: &'static str,
    binder: Binder<S>,
}

pub struct MethodTable<S> {
    entries: Vec<TableEntry<S>>,
}

impl<S> Default for MethodTable<S> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<S: Send + Sync + 'static> MethodTable<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method<A, R, E, F>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Default + Serialize + 'static,
        E: Display,
        F: Fn(&S, A, &mut R) -> Result<(), E> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let binder: Binder<S> = Arc::new(
            move |receiver: Arc<S>, params: Option<&str>| -> Result<PreparedCall, DispatchError> {
                let args: A = decode_args(params).map_err(DispatchError::ArgumentShape)?;
                let handler = Arc::clone(&handler);
                Ok(PreparedCall(Box::new(move || {
                    let mut reply = R::default();
                    handler(&*receiver, args, &mut reply)
                        .map_err(|err| DispatchError::Invocation(err.to_string()))?;
                    serde_json::to_value(&reply).map_err(DispatchError::ReplyEncoding)
                })))
            },
        );

        self.entries.push(TableEntry {
            name: name.into(),
            argument_shape: type_name::<A>(),
            reply_shape: type_name::<R>(),
            binder,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Absent params are an error. A `null` payload leaves the arguments at their
/// zero value: it decodes as-is when the type accepts `null`, otherwise as `{}`.
fn decode_args<A: DeserializeOwned>(params: Option<&str>) -> Result<A, serde_json::Error> {
    let Some(raw) = params else {
        return Err(serde_json::Error::custom("missing params"));
    };

    match serde_json::from_str(raw) {
        Err(err) if raw.trim() == "null" => serde_json::from_str("{}").map_err(|_| err),
        decoded => decoded,
    }
}

/// A method call whose arguments have already been decoded. Running it
/// allocates a fresh reply slot and encodes the reply.
pub struct PreparedCall(Box<dyn FnOnce() -> Result<Value, DispatchError> + Send>);

impl PreparedCall {
    pub fn invoke(self) -> Result<Value, DispatchError> {
        (self.0)()
    }
}

pub struct MethodDescriptor {
    service: String,
    method: String,
    argument_shape: &'static str,
    reply_shape: &'static str,
    binder: ErasedBinder,
}

impl MethodDescriptor {
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn argument_shape(&self) -> &'static str {
        self.argument_shape
    }

    pub fn reply_shape(&self) -> &'static str {
        self.reply_shape
    }

    /// Decodes raw params into this method's argument type.
    pub fn bind(&self, params: Option<&str>) -> Result<PreparedCall, DispatchError> {
        (self.binder)(params)
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("service", &self.service)
            .field("method", &self.method)
            .field("argument_shape", &self.argument_shape)
            .field("reply_shape", &self.reply_shape)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    services: HashMap<String, HashMap<String, MethodDescriptor>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S: Service>(
        &mut self,
        receiver: S,
        name: &str,
    ) -> Result<(), RegistrationError> {
        let mut table = MethodTable::new();
        S::methods(&mut table);
        self.register_with(receiver, name, table)
    }

    /// Registering a service name twice fails; the first registration stays.
    pub fn register_with<S: Send + Sync + 'static>(
        &mut self,
        receiver: S,
        name: &str,
        table: MethodTable<S>,
    ) -> Result<(), RegistrationError> {
        if name.is_empty() || name.contains('.') {
            return Err(RegistrationError::InvalidServiceName {
                service: name.to_string(),
            });
        }
        if self.services.contains_key(name) {
            return Err(RegistrationError::DuplicateService {
                service: name.to_string(),
            });
        }
        if table.is_empty() {
            return Err(RegistrationError::NoSuitableMethods {
                service: name.to_string(),
            });
        }

        let receiver = Arc::new(receiver);
        let mut methods = HashMap::with_capacity(table.len());
        for entry in table.entries {
            if entry.name.is_empty() || entry.name.contains('.') {
                return Err(RegistrationError::InvalidMethodName {
                    service: name.to_string(),
                    method: entry.name,
                });
            }
            if methods.contains_key(&entry.name) {
                return Err(RegistrationError::DuplicateMethod {
                    service: name.to_string(),
                    method: entry.name,
                });
            }

            let receiver = Arc::clone(&receiver);
            let binder = entry.binder;
            methods.insert(
                entry.name.clone(),
                MethodDescriptor {
                    service: name.to_string(),
                    method: entry.name,
                    argument_shape: entry.argument_shape,
                    reply_shape: entry.reply_shape,
                    binder: Box::new(move |params: Option<&str>| {
                        binder(Arc::clone(&receiver), params)
                    }),
                },
            );
        }

        self.services.insert(name.to_string(), methods);
        Ok(())
    }

    pub fn resolve(&self, qualified: &str) -> Result<&MethodDescriptor, DispatchError> {
        let (service, method) = match qualified.split_once('.') {
            Some((service, method))
                if !service.is_empty() && !method.is_empty() && !method.contains('.') =>
            {
                (service, method)
            }
            _ => {
                return Err(DispatchError::method_not_found(format!(
                    "rpc: service/method request ill-formed: {qualified}"
                )))
            }
        };

        let methods = self.services.get(service).ok_or_else(|| {
            DispatchError::method_not_found(format!("rpc: can't find service {qualified}"))
        })?;

        methods.get(method).ok_or_else(|| {
            DispatchError::method_not_found(format!("rpc: can't find method {qualified}"))
        })
    }

    pub fn services(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Total number of registered methods across all services.
    pub fn len(&self) -> usize {
        self.services.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
