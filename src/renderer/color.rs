use glam::{Vec2, Vec3, Vec4};

use crate::settings::MeshSettings;
use crate::skeleton::{BlendMode, Slot};

/// Secondary color written to the `uv2`/`uv3` channels in tint-black mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TintBlack {
    /// Dark color red and green.
    pub rg: Vec2,
    /// Dark color blue and the tint-black alpha.
    pub ba: Vec2,
}

/// Final color of every vertex an attachment contributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexColor {
    pub rgba: Vec4,
    pub tint_black: Option<TintBlack>,
}

impl VertexColor {
    /// Multiplies skeleton, slot and attachment tint, then applies the
    /// premultiplied-alpha and additive rules from `settings`.
    ///
    /// Under PMA an additive slot is marked by a zero alpha, or by a zero
    /// tint-black alpha when the canvas-group override is active.
    pub fn resolve(
        skeleton_color: Vec4,
        slot: &Slot,
        attachment_color: Vec4,
        settings: &MeshSettings,
    ) -> Self {
        let tint = skeleton_color * slot.color * attachment_color;
        let alpha = tint.w;
        let mut rgba = tint;
        let mut tint_black_alpha = 1.0;

        if settings.pma_vertex_colors {
            rgba = (tint.truncate() * alpha).extend(alpha);
            let canvas_group = settings.canvas_group_tint_black_active();
            if slot.blend_mode == BlendMode::Additive {
                if canvas_group {
                    tint_black_alpha = 0.0;
                } else {
                    rgba.w = 0.0;
                }
            } else if canvas_group {
                tint_black_alpha = alpha;
            }
        }

        let tint_black = settings.tint_black.then(|| {
            let mut dark = slot.dark_color.unwrap_or(Vec3::ZERO);
            if settings.pma_vertex_colors {
                dark *= alpha;
            }
            TintBlack {
                rg: Vec2::new(dark.x, dark.y),
                ba: Vec2::new(dark.z, tint_black_alpha),
            }
        });

        Self { rgba, tint_black }
    }

    pub fn packed(&self) -> u32 {
        pack_rgba(self.rgba)
    }
}

/// Packs a float color into 8-bit channels, red in the lowest byte and alpha
/// in the highest.
pub fn pack_rgba(color: Vec4) -> u32 {
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    u32::from_le_bytes([
        channel(color.x),
        channel(color.y),
        channel(color.z),
        channel(color.w),
    ])
}

pub fn unpack_rgba(packed: u32) -> Vec4 {
    let [r, g, b, a] = packed.to_le_bytes();
    Vec4::new(r as f32, g as f32, b as f32, a as f32) / 255.0
}
