//! Image tag expansion.

use crate::builder::context::BuildContext;
use crate::core::manifest::{TagCondition, TagSpec};

/// Placeholder for the short revision id.
pub const REV_SHORT_PLACEHOLDER: &str = "{rev_short}";

/// Placeholder for the friendly revision id.
pub const REV_FRIENDLY_PLACEHOLDER: &str = "{rev_friendly}";

/// Expand tag specs into full `prefix:tag` references.
///
/// Specs whose `use_if` fails are dropped. Order is preserved and
/// duplicates are kept.
pub fn expand_tag_specs(specs: &[TagSpec], ctx: &BuildContext, prefix: &str) -> Vec<String> {
    specs
        .iter()
        .filter(|spec| {
            spec.use_if
                .as_ref()
                .map_or(true, |cond| condition_passes(cond, ctx))
        })
        .map(|spec| {
            let tag = spec
                .pattern
                .replace(REV_SHORT_PLACEHOLDER, &ctx.revision.revision_id_short)
                .replace(REV_FRIENDLY_PLACEHOLDER, &ctx.revision.friendly_revision_id);
            format!("{prefix}:{tag}")
        })
        .collect()
}

fn condition_passes(cond: &TagCondition, ctx: &BuildContext) -> bool {
    cond.is_default_branch
        .map_or(true, |wanted| wanted == ctx.is_default_branch)
}

/// Tag specs for images that don't declare any: the friendly revision, plus
/// `latest` on the default branch if `tag_latest` is set.
pub fn backwards_compat_tag_specs(tag_latest: bool) -> Vec<TagSpec> {
    let mut specs = vec![TagSpec {
        pattern: REV_FRIENDLY_PLACEHOLDER.to_string(),
        use_if: None,
    }];

    if tag_latest {
        specs.push(TagSpec {
            pattern: "latest".to_string(),
            use_if: Some(TagCondition {
                is_default_branch: Some(true),
            }),
        });
    }

    specs
}
