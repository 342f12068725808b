//! Binding of level cache images and footprint parameters for one render.
//!
//! Texture slot 0 carries the border clamp image. Texture slots 1..=7 carry
//! levels blurriest first, each paired with parameter slot `texture_slot - 1`.
//! Parameter slot 7 terminates the chain.

use crate::MAX_LEVELS;
use crate::level::LevelSet;

pub const BORDER_CLAMP_TEXTURE_SLOT: u32 = 0;
pub const FIRST_LEVEL_TEXTURE_SLOT: u32 = 1;
pub const LEVEL_SLOTS: usize = MAX_LEVELS;
pub const TERMINAL_PARAM_SLOT: u32 = LEVEL_SLOTS as u32;
/// Parameter slots written per bind, terminal included.
pub const PARAM_SLOTS: usize = LEVEL_SLOTS + 1;

/// Parameters of an unused slot.
pub const NO_CONTRIBUTION: [f32; 4] = [-2.0, -2.0, 0.0, 1.0];
/// Parameters of the slot after the last level.
pub const END_OF_CHAIN: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

#[derive(Debug, PartialEq)]
pub enum ImageBinding<'a, I> {
    BorderClamp,
    White,
    Black,
    Level(&'a I),
}

impl<I> Clone for ImageBinding<'_, I> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I> Copy for ImageBinding<'_, I> {}

/// Shader-side consumer of the bindings.
pub trait ShadingStage {
    type Image;

    fn bind_image(&mut self, texture_slot: u32, image: ImageBinding<'_, Self::Image>);

    fn set_level_params(&mut self, param_slot: u32, params: [f32; 4]);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindOptions {
    /// Replace level images with alternating white/black fills.
    pub show_levels: bool,
}

#[derive(Debug, PartialEq)]
pub struct SlotBinding<'a, I> {
    pub texture_slot: u32,
    pub param_slot: u32,
    pub image: ImageBinding<'a, I>,
    pub params: [f32; 4],
    /// Level feeding this slot, if any.
    pub level_index: Option<usize>,
}

#[derive(Debug, PartialEq)]
pub struct BindingPlan<'a, I> {
    pub slots: Vec<SlotBinding<'a, I>>,
    pub terminal: [f32; 4],
}

impl<'a, I> BindingPlan<'a, I> {
    pub fn for_levels(levels: &'a LevelSet<I>, options: BindOptions) -> Self {
        let num_levels = levels.len();
        let mut slots = Vec::with_capacity(LEVEL_SLOTS);
        for slot in 0..LEVEL_SLOTS {
            let texture_slot = FIRST_LEVEL_TEXTURE_SLOT + slot as u32;
            let param_slot = slot as u32;
            let level = (slot < num_levels)
                .then(|| levels.get(num_levels - 1 - slot))
                .flatten();
            let binding = match level {
                None => SlotBinding {
                    texture_slot,
                    param_slot,
                    image: ImageBinding::White,
                    params: NO_CONTRIBUTION,
                    level_index: None,
                },
                Some(level) => {
                    let image = if !options.show_levels {
                        ImageBinding::Level(level.image())
                    } else if slot % 2 == 1 {
                        ImageBinding::Black
                    } else {
                        ImageBinding::White
                    };
                    SlotBinding {
                        texture_slot,
                        param_slot,
                        image,
                        params: level.params(),
                        level_index: Some(level.index()),
                    }
                }
            };
            slots.push(binding);
        }
        Self {
            slots,
            terminal: END_OF_CHAIN,
        }
    }

    pub fn apply<S>(&self, stage: &mut S)
    where
        S: ShadingStage<Image = I> + ?Sized,
    {
        stage.bind_image(BORDER_CLAMP_TEXTURE_SLOT, ImageBinding::BorderClamp);
        for slot in &self.slots {
            stage.bind_image(slot.texture_slot, slot.image);
            stage.set_level_params(slot.param_slot, slot.params);
        }
        stage.set_level_params(TERMINAL_PARAM_SLOT, self.terminal);
    }
}
