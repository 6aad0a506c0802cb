pub mod delivery_queue_repository;
pub mod notification_repository;

pub use delivery_queue_repository::DeliveryQueueRepository;
pub use notification_repository::NotificationRepository;
