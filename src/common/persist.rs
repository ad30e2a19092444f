use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{
        mpsc::{self, TrySendError},
        Arc, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
};

use tracing::{debug, error, trace};
use uuid::Uuid;

use crate::common::error::EscrowError;
use crate::trade::Role;

enum PersisterMsg {
    Persist,
    Close,
}

/// Durable record of "which side of this trade am I". One JSON file mapping
/// trade identifier to the role assigned at first contact, no expiry.
///
/// Writes are queued to a dedicated thread so the event loop never blocks on
/// the filesystem.
pub struct RoleStore {
    store: Arc<RwLock<HashMap<Uuid, Role>>>,
    persist_tx: mpsc::SyncSender<PersisterMsg>,
    task_handle: std::thread::JoinHandle<()>,
}

impl RoleStore {
    const FILE_NAME: &'static str = "roles.json";

    /// Opens the store under `dir_path`, reloading any previously persisted
    /// assignments. A missing file starts an empty store.
    pub fn open(dir_path: impl AsRef<Path>) -> Result<Self, EscrowError> {
        let data_path = dir_path.as_ref().join(Self::FILE_NAME);

        let roles: HashMap<Uuid, Role> = match fs::read_to_string(&data_path) {
            Ok(json) => serde_json::from_str(&json)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err.into()),
        };

        let store = Arc::new(RwLock::new(roles));
        let (persist_tx, task_handle) = Self::setup_persistence(store.clone(), data_path);

        Ok(Self {
            store,
            persist_tx,
            task_handle,
        })
    }

    fn setup_persistence(
        store: Arc<RwLock<HashMap<Uuid, Role>>>,
        data_path: PathBuf,
    ) -> (mpsc::SyncSender<PersisterMsg>, std::thread::JoinHandle<()>) {
        let (persist_tx, persist_rx) = mpsc::sync_channel(1);
        let task_handle = std::thread::spawn(move || {
            loop {
                match persist_rx.recv() {
                    Ok(PersisterMsg::Persist) => {
                        let roles = match store.read() {
                            Ok(roles) => roles,
                            Err(error) => {
                                error!("Error reading role store - {}", error);
                                continue;
                            }
                        };
                        if let Err(error) = Self::persist(&roles, &data_path) {
                            error!(
                                "Error persisting roles to path {} - {}",
                                data_path.display(),
                                error
                            );
                        }
                    }
                    Ok(PersisterMsg::Close) => break,
                    Err(err) => {
                        error!("Role persistence channel recv error - {}", err);
                        break;
                    }
                }
            }
            debug!(
                "Role persistence thread for {} exiting",
                data_path.display()
            );
        });
        (persist_tx, task_handle)
    }

    fn persist(
        roles: &RwLockReadGuard<'_, HashMap<Uuid, Role>>,
        data_path: impl AsRef<Path>,
    ) -> Result<(), EscrowError> {
        let json = serde_json::to_string(&**roles)?;
        fs::write(data_path.as_ref(), json)?;
        Ok(())
    }

    fn read_store(&self) -> RwLockReadGuard<'_, HashMap<Uuid, Role>> {
        match self.store.read() {
            Ok(store) => store,
            Err(error) => panic!("Error reading role store - {}", error),
        }
    }

    fn write_store(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, Role>> {
        match self.store.write() {
            Ok(store) => store,
            Err(error) => panic!("Error writing role store - {}", error),
        }
    }

    pub fn role(&self, trade_id: Uuid) -> Option<Role> {
        self.read_store().get(&trade_id).copied()
    }

    /// Records the one-time role assignment for a trade and queues a write.
    /// An existing assignment is never overwritten.
    pub fn assign(&self, trade_id: Uuid, role: Role) -> Role {
        let assigned = *self.write_store().entry(trade_id).or_insert(role);
        self.queue();
        assigned
    }

    fn queue(&self) {
        match self.persist_tx.try_send(PersisterMsg::Persist) {
            Ok(_) => {}
            Err(TrySendError::Full(_)) => trace!("Role persistence channel full"),
            Err(TrySendError::Disconnected(_)) => {
                error!("Role persistence channel disconnected")
            }
        }
    }

    pub fn terminate(self) {
        if self.persist_tx.send(PersisterMsg::Close).is_err() {
            return;
        }
        if let Err(error) = self.task_handle.join() {
            error!("Error terminating role persistence thread - {:?}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigned_role_round_trips_through_file() {
        let dir = std::env::temp_dir().join(format!("role-store-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();

        let trade_id = Uuid::new_v4();
        let store = RoleStore::open(&dir).unwrap();
        store.assign(trade_id, Role::Seller);
        store.terminate();

        let store = RoleStore::open(&dir).unwrap();
        assert_eq!(store.role(trade_id), Some(Role::Seller));
        store.terminate();
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn first_assignment_wins() {
        let dir = std::env::temp_dir().join(format!("role-store-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();

        let trade_id = Uuid::new_v4();
        let store = RoleStore::open(&dir).unwrap();
        assert_eq!(store.assign(trade_id, Role::Buyer), Role::Buyer);
        assert_eq!(store.assign(trade_id, Role::Seller), Role::Buyer);
        assert_eq!(store.role(trade_id), Some(Role::Buyer));
        store.terminate();
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unknown_trade_has_no_role() {
        let dir = std::env::temp_dir().join(format!("role-store-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();

        let store = RoleStore::open(&dir).unwrap();
        assert_eq!(store.role(Uuid::new_v4()), None);
        store.terminate();
        fs::remove_dir_all(&dir).unwrap();
    }
}
