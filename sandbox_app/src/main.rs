//! Lifecycle demo application
//!
//! Drives the scene runtime through a few frames without any rendering:
//! two component types are registered, a small squadron is spawned from
//! RON prototypes, input is routed through the focus stack, and one ship
//! blows itself up via the message bus.

use std::any::Any;

use scene_runtime::prelude::*;

/// Movement speed decoded from a `.speed` resource (plain text, units/s).
struct SpeedDecoder;

impl SpeedDecoder {
    fn decode(bytes: &[u8]) -> Result<Box<dyn Any>, String> {
        let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
        let speed: f32 = text.trim().parse().map_err(|_| "not a number".to_string())?;
        Ok(Box::new(speed))
    }
}

/// Moves its instances along +x, tracking total frames in user data.
struct Movers {
    speeds: Vec<f32>,
    next_handle: u64,
}

impl Movers {
    fn new() -> Self {
        Self {
            speeds: Vec::new(),
            next_handle: 0,
        }
    }
}

impl ComponentLifecycle for Movers {
    fn create(&mut self, ctx: CreateContext<'_>) -> Result<ComponentHandle, ComponentError> {
        let speed = ctx
            .resource
            .downcast_ref::<f32>()
            .copied()
            .ok_or_else(|| ComponentError::new("speed resource expected"))?;
        self.speeds.push(speed);
        let handle = ComponentHandle(self.next_handle);
        self.next_handle += 1;
        log::info!("mover created at {speed} units/s");
        Ok(handle)
    }

    fn update(
        &mut self,
        entries: &mut [ComponentEntry],
        ctx: &UpdateContext,
        _ops: &CallbackOps,
    ) -> Result<(), ComponentError> {
        for entry in entries {
            let speed = self.speeds[entry.handle.0 as usize];
            // Frame counter lives in the slot's user-data word.
            entry.user_data += 1;
            log::debug!(
                "mover {:?} advanced {:.3} units (frame {})",
                entry.instance,
                speed * ctx.dt,
                entry.user_data
            );
        }
        Ok(())
    }

    fn destroy(&mut self, entry: &mut ComponentEntry) {
        log::info!(
            "mover {:?} destroyed after {} frame(s)",
            entry.instance,
            entry.user_data
        );
    }
}

/// Consumes "fire" actions and detonates on a "self_destruct" message.
struct Gunners;

const FIRE: ActionId = ActionId::from_name("fire");
const SELF_DESTRUCT: MessageId = MessageId::from_name("self_destruct");

impl ComponentLifecycle for Gunners {
    fn create(&mut self, _ctx: CreateContext<'_>) -> Result<ComponentHandle, ComponentError> {
        Ok(ComponentHandle(0))
    }

    fn on_message(
        &mut self,
        entry: &mut ComponentEntry,
        message: &Message,
        ops: &CallbackOps,
    ) -> Result<(), ComponentError> {
        if message.id == SELF_DESTRUCT {
            log::info!("gunner on {:?} detonating", entry.instance);
            ops.delete(entry.instance);
        }
        Ok(())
    }

    fn on_input(&mut self, entry: &mut ComponentEntry, action: &InputAction) -> InputResponse {
        if action.action_id == FIRE && action.pressed {
            // Shot counter lives in the slot's user-data word.
            entry.user_data += 1;
            log::info!("gunner on {:?} fired (shot {})", entry.instance, entry.user_data);
            return InputResponse::Consumed;
        }
        InputResponse::Ignored
    }

    fn destroy(&mut self, _entry: &mut ComponentEntry) {}
}

fn build_loader() -> Result<(MemoryResourceLoader, ResourceTypeTag, ResourceTypeTag), Box<dyn std::error::Error>> {
    let mut loader = MemoryResourceLoader::new();
    loader.register_type("proto", Box::new(scene_runtime::prototype::decode))?;
    let speed_tag = loader.register_type("speed", Box::new(SpeedDecoder::decode))?;
    let gun_tag = loader.register_type("gun", Box::new(|bytes: &[u8]| {
        Ok(Box::new(bytes.to_vec()) as Box<dyn Any>)
    }))?;

    loader.insert("fast.speed", "12.5".to_string());
    loader.insert("slow.speed", "3.0".to_string());
    loader.insert("standard.gun", b"pew".to_vec());

    loader.insert(
        "fighter.proto",
        "(components: [\
            (component_type: \"mover\", resource: \"fast.speed\"),\
            (component_type: \"gunner\", resource: \"standard.gun\"),\
        ])"
        .to_string(),
    );
    loader.insert(
        "freighter.proto",
        "(components: [(component_type: \"mover\", resource: \"slow.speed\")])".to_string(),
    );

    Ok((loader, speed_tag, gun_tag))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    log::info!("Starting lifecycle demo...");

    let (loader, speed_tag, gun_tag) = build_loader()?;

    let mut builder = RegistryBuilder::new();
    builder.register(
        ComponentTypeDef::new("mover", speed_tag, Box::new(Movers::new())).with_user_data(),
    )?;
    builder.register(
        ComponentTypeDef::new("gunner", gun_tag, Box::new(Gunners))
            .with_user_data()
            .with_update_priority(1),
    )?;
    let registry = builder.build();

    let mut collection = Collection::new(registry, Box::new(loader));

    let fighter = collection.spawn("fighter.proto")?;
    let freighter = collection.spawn("freighter.proto")?;
    collection.set_local_transform(freighter, Transform::from_position(Vec3::new(0.0, 5.0, 0.0)))?;
    collection.set_parent(fighter, Some(freighter))?;
    collection.acquire_input_focus(fighter)?;
    log::info!("Spawned {} instance(s)", collection.instance_count());

    let dt = 1.0 / 60.0;
    for frame in 0..5 {
        log::info!("--- frame {frame} ---");
        collection.update(&UpdateContext::new(dt))?;

        if frame == 1 {
            collection.dispatch_input(&[InputAction::pressed(FIRE)]);
        }
        if frame == 2 {
            log::info!("ordering the fighter to self-destruct");
            collection.post_message(Message::broadcast(fighter, SELF_DESTRUCT));
        }

        collection.post_update();
    }

    // The fighter detonated; the freighter carries on alone.
    log::info!("{} instance(s) survived", collection.instance_count());
    let world = collection.world_transform(freighter)?;
    log::info!("freighter world position: ({:.1}, {:.1}, {:.1})", world.m14, world.m24, world.m34);

    Ok(())
}
