// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Descriptors of the images BL2 loads, and the registry holding them.

use arrayvec::ArrayVec;
use num_enum::IntoPrimitive;

/// The maximum number of images BL2 can describe.
pub const MAX_IMAGES: usize = 8;

/// Identifiers of the images known to the firmware image package.
#[derive(Clone, Copy, Debug, Eq, IntoPrimitive, PartialEq)]
#[repr(u32)]
pub enum ImageId {
    /// The secure payload. With OP-TEE this is the header image.
    Bl32 = 4,
    /// The non-secure payload.
    Bl33 = 5,
    /// The OP-TEE pager.
    Bl32Extra1 = 21,
    /// The OP-TEE paged image.
    Bl32Extra2 = 22,
}

/// The execution state an image is entered in.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ExecutionState {
    /// AArch32.
    AArch32,
    /// AArch64.
    #[default]
    AArch64,
}

/// Where an image lives in memory.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ImageInfo {
    /// The load address.
    pub base: usize,
    /// The largest size the image may have.
    pub max_size: usize,
    /// The size of the image actually loaded.
    pub size: usize,
}

impl ImageInfo {
    /// Creates an image info for an image which hasn't been loaded yet.
    pub const fn new(base: usize, max_size: usize) -> Self {
        Self {
            base,
            max_size,
            size: 0,
        }
    }
}

/// Information about the entry point for a next stage.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EntryPointInfo {
    /// The entry point address.
    pub pc: usize,
    /// Address the secure payload returns to once initialised, used by a 32-bit monitor.
    pub lr_svc: usize,
    /// The execution state to enter the image in.
    pub execution_state: ExecutionState,
    /// Boot arguments to pass in `x0`-`x7`.
    pub args: [u64; 8],
}

/// Everything BL2 knows about one image.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageDescriptor {
    /// Which image this is.
    pub id: ImageId,
    /// Where the image is loaded.
    pub image_info: ImageInfo,
    /// How the image is entered.
    pub ep_info: EntryPointInfo,
    /// The image was loaded by the boot ROM along with BL2, so BL2 doesn't load it.
    pub preloaded: bool,
}

impl ImageDescriptor {
    /// Creates a descriptor whose entry point is the start of its load area.
    pub fn new(id: ImageId, image_info: ImageInfo) -> Self {
        Self {
            id,
            image_info,
            ep_info: EntryPointInfo {
                pc: image_info.base,
                ..Default::default()
            },
            preloaded: false,
        }
    }
}

/// The images to load, in load order.
#[derive(Clone, Debug, Default)]
pub struct ImageRegistry {
    descriptors: ArrayVec<ImageDescriptor, MAX_IMAGES>,
}

impl ImageRegistry {
    /// Creates a registry from the given descriptors.
    ///
    /// # Panics
    ///
    /// Panics if more than [`MAX_IMAGES`] descriptors are given, or an id appears twice.
    pub fn new(descriptors: impl IntoIterator<Item = ImageDescriptor>) -> Self {
        let mut registry = Self::default();
        for descriptor in descriptors {
            assert!(
                registry.get(descriptor.id).is_none(),
                "Duplicate image descriptor {:?}",
                descriptor.id
            );
            registry.descriptors.push(descriptor);
        }
        registry
    }

    /// Returns the descriptor for the given image, if there is one.
    pub fn get(&self, id: ImageId) -> Option<&ImageDescriptor> {
        self.descriptors.iter().find(|descriptor| descriptor.id == id)
    }

    /// Returns the descriptor for the given image mutably, if there is one.
    pub fn get_mut(&mut self, id: ImageId) -> Option<&mut ImageDescriptor> {
        self.descriptors
            .iter_mut()
            .find(|descriptor| descriptor.id == id)
    }

    /// Returns the ids of all images in load order.
    pub fn ids(&self) -> ArrayVec<ImageId, MAX_IMAGES> {
        self.descriptors
            .iter()
            .map(|descriptor| descriptor.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_id() {
        let mut registry = ImageRegistry::new([
            ImageDescriptor::new(ImageId::Bl32, ImageInfo::new(0x2ffe_7000, 0x1_9000)),
            ImageDescriptor::new(ImageId::Bl33, ImageInfo::new(0xc010_0000, 0x40_0000)),
        ]);

        assert_eq!(registry.ids().as_slice(), [ImageId::Bl32, ImageId::Bl33]);
        assert!(registry.get(ImageId::Bl32Extra1).is_none());

        registry.get_mut(ImageId::Bl33).unwrap().ep_info.args[0] = 42;
        let bl33 = registry.get(ImageId::Bl33).unwrap();
        assert_eq!(bl33.ep_info.pc, 0xc010_0000);
        assert_eq!(bl33.ep_info.args[0], 42);
    }

    #[test]
    #[should_panic]
    fn duplicate_ids() {
        ImageRegistry::new([
            ImageDescriptor::new(ImageId::Bl32, ImageInfo::new(0, 0x1000)),
            ImageDescriptor::new(ImageId::Bl32, ImageInfo::new(0x1000, 0x1000)),
        ]);
    }

    #[test]
    fn image_id_values() {
        assert_eq!(u32::from(ImageId::Bl32), 4);
        assert_eq!(u32::from(ImageId::Bl33), 5);
        assert_eq!(u32::from(ImageId::Bl32Extra1), 21);
        assert_eq!(u32::from(ImageId::Bl32Extra2), 22);
    }
}
