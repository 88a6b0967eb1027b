//! # Scene Runtime
//!
//! A scene-graph and component runtime: instances carry transforms,
//! hierarchy links, and ordered component slots; external subsystems plug
//! in as registered component types with a fixed lifecycle callback set.
//!
//! ## Features
//!
//! - **Pluggable Component Types**: Closed dispatch table built once at
//!   startup, no process-global registry
//! - **Transactional Spawning**: A prototype spawns completely or rolls
//!   back in reverse creation order
//! - **Deferred Destruction**: Deletion marks now, destroys at the next
//!   `post_update` boundary
//! - **Message Passing**: Asynchronous mailbox drained per frame
//! - **Input Focus**: Stack-based routing of input actions
//! - **Stale Handle Detection**: Generation-tagged keys instead of
//!   dangling pointers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_runtime::prelude::*;
//!
//! struct Sprites;
//!
//! impl ComponentLifecycle for Sprites {
//!     fn create(&mut self, _ctx: CreateContext<'_>) -> Result<ComponentHandle, ComponentError> {
//!         Ok(ComponentHandle(0))
//!     }
//!
//!     fn destroy(&mut self, _entry: &mut ComponentEntry) {}
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut loader = MemoryResourceLoader::new();
//!     loader.register_type("proto", Box::new(scene_runtime::prototype::decode))?;
//!     let tag = loader.register_type("sprite", Box::new(|bytes| {
//!         Ok(Box::new(bytes.to_vec()) as Box<dyn std::any::Any>)
//!     }))?;
//!     loader.insert("hero.sprite", b"...".to_vec());
//!     loader.insert(
//!         "hero.proto",
//!         "(components: [(component_type: \"sprite\", resource: \"hero.sprite\")])".to_string(),
//!     );
//!
//!     let mut builder = RegistryBuilder::new();
//!     builder.register(ComponentTypeDef::new("sprite", tag, Box::new(Sprites)))?;
//!
//!     let mut collection = Collection::new(builder.build(), Box::new(loader));
//!     let hero = collection.spawn("hero.proto")?;
//!     collection.update(&UpdateContext::new(1.0 / 60.0))?;
//!     collection.post_update();
//!     collection.delete(hero)?;
//!     collection.post_update();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;

pub mod collection;
pub mod config;
pub mod input;
pub mod instance;
pub mod message;
pub mod prototype;
pub mod registry;
pub mod resource;

/// Common imports for runtime users
pub mod prelude {
    pub use crate::{
        collection::{
            CallbackOps, Collection, CollectionError, SpawnError, UpdateContext, UpdateError,
        },
        config::RuntimeConfig,
        foundation::math::{Mat4, Quat, Transform, Vec3},
        input::{ActionId, InputAction, InputResponse},
        instance::{Instance, InstanceKey},
        message::{Message, MessageId},
        prototype::Prototype,
        registry::{
            ComponentEntry, ComponentError, ComponentHandle, ComponentLifecycle, ComponentTypeDef,
            CreateContext, Registry, RegistryBuilder,
        },
        resource::{MemoryResourceLoader, ResourceHandle, ResourceLoader, ResourceTypeTag},
    };
}
