//! Batched ray processing: fixed-capacity queues with lock-free slot
//! reservation, ray generators that refill them, and the double-buffered
//! scheduler driving fill / traverse / process / shadow rounds.
pub mod queue;
pub mod ray_gen;
pub mod scheduler;

pub use queue::RayQueue;
pub use ray_gen::{ArrayRayGen, LightRayGen, PixelRayGen, RayGen, TiledRayGen};
pub use scheduler::RayScheduler;

/// State carried alongside each ray in a queue. A negative pixel id marks a
/// dead entry that compaction may drop.
pub trait RayState {
    fn pixel_id(&self) -> i32;
    fn sample_id(&self) -> i32;
    fn set_ids(&mut self, pixel_id: i32, sample_id: i32);
}
