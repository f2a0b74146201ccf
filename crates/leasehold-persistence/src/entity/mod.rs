pub mod distributed_lock;

pub mod prelude {
    pub use super::distributed_lock::Entity as DistributedLock;
}
