//! `<boards>` section: board names become aliases for their mounted devices.

use crate::models::AliasRecord;
use crate::xml::Element;
use tracing::{debug, warn};

pub(crate) fn parse_boards(boards: &Element) -> Vec<AliasRecord> {
    boards
        .children_named("board")
        .filter_map(|board| {
            let Some(name) = board.attr("name") else {
                warn!("Skipping board without a name");
                return None;
            };
            let mounted: Vec<&str> = board
                .children_named("mountedDevice")
                .filter_map(|mounted| mounted.attr("Dname"))
                .collect();
            if mounted.is_empty() {
                debug!(board = name, "Board has no mounted devices");
                return None;
            }
            Some(AliasRecord::new(name, mounted))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boards() {
        let root = Element::parse(
            br#"<boards>
              <board vendor="Embedded Artists" name="LPC1788-32 Developers Kit">
                <mountedDevice deviceIndex="0" Dvendor="NXP:11" Dname="LPC1788"/>
                <compatibleDevice deviceIndex="0" Dvendor="NXP:11" Dname="LPC1787"/>
              </board>
              <board name="Dual Core Board">
                <mountedDevice Dname="CoreA"/>
                <mountedDevice Dname="CoreB"/>
              </board>
              <board name="Empty Board"/>
              <board><mountedDevice Dname="Orphan"/></board>
            </boards>"#,
        )
        .unwrap();
        let aliases = parse_boards(&root);
        assert_eq!(
            aliases,
            vec![
                AliasRecord::new("LPC1788-32 Developers Kit", ["LPC1788"]),
                AliasRecord::new("Dual Core Board", ["CoreA", "CoreB"]),
            ]
        );
    }
}
