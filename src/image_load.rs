// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The images BL2 loads and the fix-ups applied to them once loaded.

use crate::{
    config::{Bl2Config, SecurePayload},
    error::Fatal,
    image::{ImageDescriptor, ImageId, ImageInfo, ImageRegistry},
    optee::parse_optee_header,
    platform::Platform,
    setup::DdrLayout,
};
use log::debug;

/// Returns the descriptors of the images to load for `payload`, in load order.
pub fn image_descriptors<P: Platform>(payload: SecurePayload) -> ImageRegistry {
    let bl32 = ImageDescriptor::new(ImageId::Bl32, ImageInfo::new(P::BL32_BASE, P::BL32_SIZE));
    let bl33 = ImageDescriptor::new(
        ImageId::Bl33,
        ImageInfo::new(P::BL33_BASE, P::BL33_MAX_SIZE),
    );
    match payload {
        SecurePayload::OpTee => ImageRegistry::new([
            bl32,
            ImageDescriptor::new(
                ImageId::Bl32Extra1,
                ImageInfo::new(P::OPTEE_BASE, P::OPTEE_SIZE),
            ),
            // Placed in the secure DRAM carve-out once the DRAM size is known.
            ImageDescriptor::new(
                ImageId::Bl32Extra2,
                ImageInfo::new(P::DDR_BASE, P::DDR_S_SIZE),
            ),
            bl33,
        ]),
        SecurePayload::SpMin => ImageRegistry::new([
            ImageDescriptor {
                preloaded: true,
                ..bl32
            },
            bl33,
        ]),
    }
}

/// Fixes up the descriptors after image `id` has been loaded.
///
/// With OP-TEE, the BL32 header image is parsed to place the pager and paged images, and the BL33
/// entry point is recorded as the address OP-TEE returns to. Nothing is needed for SP_MIN.
pub fn handle_post_image_load<P: Platform>(
    platform: &P,
    config: &Bl2Config,
    images: &mut ImageRegistry,
    ddr: &DdrLayout,
    id: ImageId,
) -> Result<(), Fatal> {
    if config.payload != SecurePayload::OpTee {
        return Ok(());
    }

    match id {
        ImageId::Bl32 => split_optee_image(platform, images, ddr),
        ImageId::Bl33 => {
            let bl33_pc = descriptor(images, ImageId::Bl33)?.ep_info.pc;
            descriptor(images, ImageId::Bl32)?.ep_info.lr_svc = bl33_pc;
            Ok(())
        }
        _ => Ok(()),
    }
}

fn descriptor(images: &mut ImageRegistry, id: ImageId) -> Result<&mut ImageDescriptor, Fatal> {
    images.get_mut(id).ok_or(Fatal::MissingImage(id))
}

/// Parses the OP-TEE header in the loaded BL32 image and points BL32 at the pager.
///
/// The descriptors are only updated once the whole header has been validated.
fn split_optee_image<P: Platform>(
    platform: &P,
    images: &mut ImageRegistry,
    ddr: &DdrLayout,
) -> Result<(), Fatal> {
    let bl32 = descriptor(images, ImageId::Bl32)?;
    let header_info = bl32.image_info;
    let mut ep_info = bl32.ep_info.clone();
    ep_info.pc = header_info.base;

    let mut pager = descriptor(images, ImageId::Bl32Extra1)?.image_info;
    pager.base = P::OPTEE_BASE;
    pager.max_size = P::OPTEE_SIZE;

    let mut paged = descriptor(images, ImageId::Bl32Extra2)?.image_info;
    paged.base = ddr.secure.start;
    paged.max_size = ddr.secure.len();

    parse_optee_header(
        platform.loaded_image(&header_info),
        &mut ep_info,
        &mut pager,
        &mut paged,
    )?;

    ep_info.pc = pager.base;
    ep_info.args[0] = paged.base as u64;
    // Unused.
    ep_info.args[1] = 0;
    // No device tree is passed to OP-TEE.
    ep_info.args[2] = 0;
    debug!(
        "OP-TEE pager at {:#x}, paged image at {:#x}",
        pager.base, paged.base
    );

    descriptor(images, ImageId::Bl32Extra1)?.image_info = pager;
    descriptor(images, ImageId::Bl32Extra2)?.image_info = paged;
    descriptor(images, ImageId::Bl32)?.ep_info = ep_info;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        optee::{OpteeError, tests::optee_header},
        platform::test::TestPlatform,
    };

    const OPTEE: Bl2Config = Bl2Config {
        payload: SecurePayload::OpTee,
    };
    const SP_MIN: Bl2Config = Bl2Config {
        payload: SecurePayload::SpMin,
    };
    const DRAM_SIZE: usize = 0x2000_0000;
    const PAGED_BASE: usize = 0xde00_0000;

    fn ddr() -> DdrLayout {
        DdrLayout::new::<TestPlatform>(DRAM_SIZE, SecurePayload::OpTee).unwrap()
    }

    /// Loads BL32 with the given contents into a fresh OP-TEE registry.
    fn load_bl32(header: Vec<u8>) -> (TestPlatform, ImageRegistry) {
        let mut platform = TestPlatform::default();
        platform.fip.insert(ImageId::Bl32.into(), header);
        let mut images = image_descriptors::<TestPlatform>(SecurePayload::OpTee);
        platform
            .load_image(images.get_mut(ImageId::Bl32).unwrap())
            .unwrap();
        (platform, images)
    }

    #[test]
    fn optee_descriptors() {
        let images = image_descriptors::<TestPlatform>(SecurePayload::OpTee);
        assert_eq!(
            images.ids().as_slice(),
            [
                ImageId::Bl32,
                ImageId::Bl32Extra1,
                ImageId::Bl32Extra2,
                ImageId::Bl33
            ]
        );
        assert!(!images.get(ImageId::Bl32).unwrap().preloaded);
    }

    #[test]
    fn sp_min_descriptors() {
        let images = image_descriptors::<TestPlatform>(SecurePayload::SpMin);
        assert_eq!(images.ids().as_slice(), [ImageId::Bl32, ImageId::Bl33]);
        let bl32 = images.get(ImageId::Bl32).unwrap();
        assert!(bl32.preloaded);
        assert_eq!(bl32.ep_info.pc, TestPlatform::BL32_BASE);
    }

    #[test]
    fn splits_well_formed_header() {
        let (platform, mut images) = load_bl32(optee_header(
            1,
            &[
                (u64::MAX, 0, 0x8000),
                (u64::MAX, 1, 0x10_0000),
            ],
        ));

        handle_post_image_load(&platform, &OPTEE, &mut images, &ddr(), ImageId::Bl32).unwrap();

        let pager = images.get(ImageId::Bl32Extra1).unwrap().image_info;
        assert_eq!(pager.base, TestPlatform::OPTEE_BASE);
        assert_eq!(pager.size, 0x8000);
        let paged = images.get(ImageId::Bl32Extra2).unwrap().image_info;
        assert_eq!(paged.base, PAGED_BASE);
        assert_eq!(paged.max_size, TestPlatform::DDR_S_SIZE);
        assert_eq!(paged.size, 0x10_0000);

        let bl32 = &images.get(ImageId::Bl32).unwrap().ep_info;
        assert_eq!(bl32.pc, pager.base);
        assert_eq!(bl32.args[0], paged.base as u64);
        assert_eq!(bl32.args[1], 0);
        assert_eq!(bl32.args[2], 0);
    }

    #[test]
    fn corrupt_header_commits_nothing() {
        // The paged image claims more than the secure carve-out.
        let (platform, mut images) = load_bl32(optee_header(
            1,
            &[
                (u64::MAX, 0, 0x8000),
                (u64::MAX, 1, TestPlatform::DDR_S_SIZE as u32 + 0x1000),
            ],
        ));
        let before = images.clone();

        assert!(matches!(
            handle_post_image_load(&platform, &OPTEE, &mut images, &ddr(), ImageId::Bl32),
            Err(Fatal::Optee(OpteeError::OutOfReservedArea { .. }))
        ));
        for id in before.ids() {
            assert_eq!(images.get(id), before.get(id));
        }
    }

    #[test]
    fn headerless_image_is_rejected() {
        let (platform, mut images) = load_bl32(vec![0; 0x100]);
        assert_eq!(
            handle_post_image_load(&platform, &OPTEE, &mut images, &ddr(), ImageId::Bl32),
            Err(Fatal::Optee(OpteeError::NoHeader))
        );
    }

    #[test]
    fn missing_descriptors() {
        let platform = TestPlatform::default();
        let bl32 = ImageDescriptor::new(
            ImageId::Bl32,
            ImageInfo::new(TestPlatform::BL32_BASE, TestPlatform::BL32_SIZE),
        );
        let pager = ImageDescriptor::new(
            ImageId::Bl32Extra1,
            ImageInfo::new(TestPlatform::OPTEE_BASE, TestPlatform::OPTEE_SIZE),
        );

        let mut images = ImageRegistry::new([bl32.clone()]);
        assert_eq!(
            handle_post_image_load(&platform, &OPTEE, &mut images, &ddr(), ImageId::Bl32),
            Err(Fatal::MissingImage(ImageId::Bl32Extra1))
        );

        let mut images = ImageRegistry::new([bl32, pager]);
        assert_eq!(
            handle_post_image_load(&platform, &OPTEE, &mut images, &ddr(), ImageId::Bl32),
            Err(Fatal::MissingImage(ImageId::Bl32Extra2))
        );
    }

    #[test]
    fn bl33_sets_return_address() {
        let platform = TestPlatform::default();
        let mut images = image_descriptors::<TestPlatform>(SecurePayload::OpTee);

        handle_post_image_load(&platform, &OPTEE, &mut images, &ddr(), ImageId::Bl33).unwrap();
        assert_eq!(
            images.get(ImageId::Bl32).unwrap().ep_info.lr_svc,
            TestPlatform::BL33_BASE
        );
    }

    #[test]
    fn other_images_are_untouched() {
        let platform = TestPlatform::default();
        let mut images = image_descriptors::<TestPlatform>(SecurePayload::OpTee);
        let before = images.clone();

        handle_post_image_load(&platform, &OPTEE, &mut images, &ddr(), ImageId::Bl32Extra1)
            .unwrap();
        assert_eq!(
            images.get(ImageId::Bl32Extra1),
            before.get(ImageId::Bl32Extra1)
        );
    }

    #[test]
    fn sp_min_is_a_no_op() {
        let platform = TestPlatform::default();
        let mut images = image_descriptors::<TestPlatform>(SecurePayload::SpMin);
        let before = images.clone();

        for id in [ImageId::Bl32, ImageId::Bl33] {
            handle_post_image_load(&platform, &SP_MIN, &mut images, &ddr(), id).unwrap();
        }
        for id in before.ids() {
            assert_eq!(images.get(id), before.get(id));
        }
    }
}
