use super::error::Role;

const CYCLE: [Role; 3] = [Role::Title, Role::Url, Role::Image];

/// Expected role of the block at `index` within its three-block group.
pub fn role(index: usize) -> Role {
    CYCLE[index % 3]
}

pub fn group_number(index: usize) -> usize {
    index / 3 + 1
}
