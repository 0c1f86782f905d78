pub mod animation;
pub mod frame;

pub use animation::AnimationAssembler;
pub use frame::FrameRenderer;
