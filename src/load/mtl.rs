use {
    super::{lines, text, tokens},
    crate::model::Material,
    log::debug,
};

/// Walks an MTL byte buffer and returns one material record per `newmtl`
/// block, gathering texture-map filenames scoped to the most recent
/// material.
///
/// The first pass only counts `newmtl` occurrences to size the output.
/// Lines may lead with whitespace; names and map paths are the single
/// whitespace-delimited token after the directive; everything outside the
/// recognized directive set is ignored.
pub(crate) fn parse(bytes: &[u8]) -> Vec<Material> {
    let count = lines(bytes)
        .filter_map(|(_, line)| tokens(line).next())
        .filter(|directive| *directive == b"newmtl")
        .count();
    let mut materials = Vec::with_capacity(count);

    for (_, line) in lines(bytes) {
        let mut tokens = tokens(line);
        let Some(directive) = tokens.next() else {
            continue;
        };
        let Some(argument) = tokens.next().map(text) else {
            continue;
        };

        match directive {
            b"newmtl" => materials.push(Material {
                name: argument,
                ..Default::default()
            }),
            b"map_Kd" => push_map(&mut materials, argument, |m| &mut m.diffuse_maps),
            b"map_Ks" | b"map_Ns" => push_map(&mut materials, argument, |m| &mut m.specular_maps),
            b"map_Bump" | b"bump" => push_map(&mut materials, argument, |m| &mut m.normal_maps),
            b"disp" => push_map(&mut materials, argument, |m| &mut m.height_maps),
            _ => (),
        }
    }

    materials
}

fn push_map(
    materials: &mut [Material],
    path: String,
    select: impl FnOnce(&mut Material) -> &mut Vec<String>,
) {
    if let Some(material) = materials.last_mut() {
        select(material).push(path);
    } else {
        debug!("ignoring texture map {path} before any newmtl");
    }
}

#[cfg(test)]
mod tests {
    use super::parse;

    #[test]
    fn maps_scope_to_the_latest_material() {
        let src = b"# comment\n\
            newmtl stone\n\
            map_Kd stone_albedo.png\n\
            map_Bump stone_n.png\n\
            newmtl wood\n\
            \tmap_Kd wood_albedo.png\n\
            map_Ns wood_gloss.png\n\
            bump wood_n.png\n\
            disp wood_h.png\n";

        let materials = parse(src);

        assert_eq!(materials.len(), 2);
        assert_eq!(materials[0].name, "stone");
        assert_eq!(materials[0].diffuse_maps, ["stone_albedo.png"]);
        assert_eq!(materials[0].normal_maps, ["stone_n.png"]);
        assert!(materials[0].specular_maps.is_empty());

        assert_eq!(materials[1].name, "wood");
        assert_eq!(materials[1].diffuse_maps, ["wood_albedo.png"]);
        assert_eq!(materials[1].specular_maps, ["wood_gloss.png"]);
        assert_eq!(materials[1].normal_maps, ["wood_n.png"]);
        assert_eq!(materials[1].height_maps, ["wood_h.png"]);
    }

    #[test]
    fn unrecognized_directives_are_ignored() {
        let src = b"newmtl flat\n\
            Ka 1.0 1.0 1.0\n\
            Kd 0.5 0.5 0.5\n\
            illum 2\n\
            map_Ks spec.png\n";

        let materials = parse(src);

        assert_eq!(materials.len(), 1);
        assert_eq!(materials[0].specular_maps, ["spec.png"]);
        assert!(materials[0].diffuse_maps.is_empty());
    }

    #[test]
    fn maps_before_any_material_are_dropped() {
        let materials = parse(b"map_Kd orphan.png\nnewmtl real\n");

        assert_eq!(materials.len(), 1);
        assert!(materials[0].diffuse_maps.is_empty());
    }

    #[test]
    fn empty_input_yields_no_materials() {
        assert!(parse(b"").is_empty());
    }
}
