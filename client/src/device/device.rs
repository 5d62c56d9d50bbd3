use std::sync::Arc;

use log::{debug, info, warn};

use pvproxy_shared::{PvData, PvType};

use crate::{
    client_config::ClientConfig,
    connection::Connection,
    subscription::{ContextToken, MonitorUpdate, SubscriptionHandle},
    transport::Transport,
    variable::{IoError, Variable},
};

use super::error::{DeviceError, InitError};

/// A named set of Variables sharing one name prefix and one Connection.
///
/// Variables are kept in creation order; teardown walks them in reverse.
pub struct Device {
    name: String,
    connection: Connection,
    variables: Vec<Arc<Variable>>,
    torn_down: bool,
}

impl Device {
    /// Opens a connection and creates one Variable per field. Either every
    /// Variable is created or none survive.
    pub fn init<I, S>(
        name: &str,
        fields: I,
        transport: Arc<dyn Transport>,
        config: ClientConfig,
    ) -> Result<Self, InitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        info!("Initializing device {}", name);
        let connection =
            Connection::open_with(transport, config).map_err(|source| InitError::Connect {
                device: name.to_string(),
                source,
            })?;

        let mut variables: Vec<Arc<Variable>> = Vec::new();
        for field in fields {
            let field = field.as_ref();
            match Self::create_variable(&connection, name, field, &variables) {
                Ok(variable) => variables.push(Arc::new(variable)),
                Err(error) => {
                    warn!(
                        "Initialization of device {} failed, unwinding {} variable(s): {}",
                        name,
                        variables.len(),
                        error
                    );
                    Self::unwind(&connection, variables);
                    return Err(error);
                }
            }
        }

        info!("Device {} initialized with {} variable(s)", name, variables.len());
        Ok(Self {
            name: name.to_string(),
            connection,
            variables,
            torn_down: false,
        })
    }

    fn create_variable(
        connection: &Connection,
        name: &str,
        field: &str,
        existing: &[Arc<Variable>],
    ) -> Result<Variable, InitError> {
        if existing.iter().any(|variable| variable.field() == field) {
            return Err(InitError::DuplicateField {
                device: name.to_string(),
                field: field.to_string(),
            });
        }

        Variable::create(connection, name, field).map_err(|source| InitError::Channel {
            device: name.to_string(),
            variable: format!("{}{}", name, field),
            source,
        })
    }

    fn unwind(connection: &Connection, variables: Vec<Arc<Variable>>) {
        for variable in variables.iter().rev() {
            if let Err(error) = variable.destroy() {
                warn!("Failed to destroy {} while unwinding: {}", variable.name(), error);
            }
        }
        drop(variables);

        if let Err(error) = connection.close() {
            warn!("Failed to close connection while unwinding: {}", error);
        }
    }

    // Accessors

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Variables in creation order
    pub fn variables(&self) -> impl Iterator<Item = &Arc<Variable>> {
        self.variables.iter()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Finds a variable by the field suffix it was created with
    pub fn lookup(&self, field: &str) -> Result<&Arc<Variable>, DeviceError> {
        self.variables
            .iter()
            .find(|variable| variable.field() == field)
            .ok_or_else(|| DeviceError::NotFound {
                device: self.name.clone(),
                field: field.to_string(),
            })
    }

    // I/O

    /// Reads every variable with its negotiated type, in creation order.
    /// The first failure stops the sweep.
    pub fn read_all(&self) -> Result<Vec<(String, PvData)>, DeviceError> {
        let mut values = Vec::with_capacity(self.variables.len());
        for variable in &self.variables {
            let data = variable.read_value().map_err(|source| DeviceError::Read {
                device: self.name.clone(),
                variable: variable.name().to_string(),
                source,
            })?;
            values.push((variable.field().to_string(), data));
        }
        Ok(values)
    }

    pub fn read_pv<T: PvType>(&self, field: &str) -> Result<T, DeviceError> {
        let variable = self.lookup(field)?;
        variable.read::<T>().map_err(|source| self.io_error(variable, source))
    }

    pub fn read_pv_value(&self, field: &str) -> Result<PvData, DeviceError> {
        let variable = self.lookup(field)?;
        variable.read_value().map_err(|source| self.io_error(variable, source))
    }

    pub fn write_pv<T: PvType>(&self, field: &str, value: T) -> Result<(), DeviceError> {
        let variable = self.lookup(field)?;
        variable.write(value).map_err(|source| self.io_error(variable, source))
    }

    // Monitors

    pub fn add_monitor<F>(
        &self,
        field: &str,
        handler: F,
        context: ContextToken,
    ) -> Result<SubscriptionHandle, DeviceError>
    where
        F: Fn(&MonitorUpdate, &ContextToken) + Send + Sync + 'static,
    {
        let variable = self.lookup(field)?;
        variable
            .subscribe(handler, context)
            .map_err(|source| DeviceError::Subscribe {
                device: self.name.clone(),
                variable: variable.name().to_string(),
                source,
            })
    }

    pub fn remove_monitor(&self, field: &str) -> Result<(), DeviceError> {
        let variable = self.lookup(field)?;
        variable
            .unsubscribe()
            .map_err(|source| self.io_error(variable, source))
    }

    // Teardown

    /// Destroys every variable in reverse creation order, cancels whatever
    /// is left in the subscription registry, then closes the connection.
    /// Calling it again does nothing.
    pub fn teardown(&mut self) -> Result<(), DeviceError> {
        if self.torn_down {
            debug!("Device {} already torn down", self.name);
            return Ok(());
        }
        self.torn_down = true;
        info!("Tearing down device {}", self.name);

        let mut first_error = None;
        for variable in self.variables.iter().rev() {
            if variable.is_destroyed() {
                continue;
            }
            if let Err(source) = variable.destroy() {
                warn!("Failed to destroy {}: {}", variable.name(), source);
                first_error.get_or_insert(DeviceError::Teardown {
                    device: self.name.clone(),
                    variable: variable.name().to_string(),
                    source,
                });
            }
        }

        if let Err(status) = self.connection.registry().remove_all() {
            first_error.get_or_insert(DeviceError::Registry {
                device: self.name.clone(),
                status,
            });
        }

        if let Err(source) = self.connection.close() {
            first_error.get_or_insert(DeviceError::Close {
                device: self.name.clone(),
                source,
            });
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn io_error(&self, variable: &Variable, source: IoError) -> DeviceError {
        DeviceError::Io {
            device: self.name.clone(),
            variable: variable.name().to_string(),
            source,
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Err(error) = self.teardown() {
            warn!("Failed to tear down device {} on drop: {}", self.name, error);
        }
    }
}
