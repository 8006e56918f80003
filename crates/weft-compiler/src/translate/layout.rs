//! Struct layout: decides the bit-exact position of every field.
//!
//! A struct's storage is a data section measured in 64-bit words plus a
//! pointer section measured in slots. Scalar fields pack into the data
//! section at natural alignment without gaps where possible; all variants
//! of a union overlap in the same storage; groups reuse their parent
//! union's space.
//!
//! Scopes form a tree (struct, unions, groups, nested again) and every
//! allocation request travels parent-ward. The tree lives in a
//! [`StructLayout`] arena and scopes address each other by id, so the
//! upward mutation never needs reference cycles.

/// Padding holes of power-of-two bit sizes inside allocated space.
///
/// At most one hole of each size 2^0..2^5 bits can exist; 2^6 is a whole
/// word and never a hole. Each slot stores the hole's offset as a multiple
/// of its own size; zero means no hole, since allocation starts at offset 0
/// and the first field always claims it.
///
/// Why at most one per size: every field is a power of two bits, aligned to
/// its own size, at most 64 bits wide. Allocating N bits either splits the
/// smallest hole M >= N into holes of sizes 2N, 4N, .., M/2 (sizes that
/// could not already exist, M being minimal), or appends a fresh word and
/// registers holes N..32 (none of which existed, since no hole >= N did).
/// Induction from the empty set preserves uniqueness.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HoleSet {
    pub(crate) holes: [u32; 6],
}

impl HoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a 2^lg_size-bit region from the holes, returning its offset
    /// as a multiple of its own size.
    pub fn try_allocate(&mut self, lg_size: u32) -> Option<u32> {
        if lg_size as usize >= self.holes.len() {
            None
        } else if self.holes[lg_size as usize] != 0 {
            let result = self.holes[lg_size as usize];
            self.holes[lg_size as usize] = 0;
            Some(result)
        } else {
            // Take the first half of the next size up; the second half
            // becomes a new hole of this size.
            let next = self.try_allocate(lg_size + 1)?;
            let result = next * 2;
            self.holes[lg_size as usize] = result + 1;
            Some(result)
        }
    }

    /// Register holes of sizes lg_size, lg_size+1, .., limit-1 left over
    /// after allocating a 2^lg_size region at the start of a 2^limit
    /// region. `offset` must be odd at each step and each slot empty.
    pub fn add_holes_at_end(&mut self, mut lg_size: u32, mut offset: u32, limit: u32) {
        debug_assert!(limit as usize <= self.holes.len());
        while lg_size < limit {
            debug_assert_eq!(self.holes[lg_size as usize], 0);
            debug_assert_eq!(offset % 2, 1);
            self.holes[lg_size as usize] = offset;
            lg_size += 1;
            offset = (offset + 1) / 2;
        }
    }

    /// Grow the region at `(old_lg_size, old_offset)` by a factor of
    /// 2^expansion, consuming the adjacent holes that make it possible.
    /// No state changes unless the whole expansion succeeds.
    pub fn try_expand(&mut self, old_lg_size: u32, old_offset: u32, expansion: u32) -> bool {
        if expansion == 0 {
            return true;
        }
        if old_lg_size as usize >= self.holes.len() {
            return false;
        }
        if self.holes[old_lg_size as usize] != old_offset + 1 {
            // The space immediately after the region is not a hole.
            return false;
        }
        if self.try_expand(old_lg_size + 1, old_offset >> 1, expansion - 1) {
            self.holes[old_lg_size as usize] = 0;
            true
        } else {
            false
        }
    }

    /// The lg of the smallest non-empty hole of size at least 2^lg_size.
    pub fn smallest_at_least(&self, lg_size: u32) -> Option<u32> {
        (lg_size..self.holes.len() as u32).find(|&i| self.holes[i as usize] != 0)
    }

    /// Log2 of the used width of the first word of the section.
    ///
    /// If a 32-bit hole sits at 32-bit offset 1, no more than the first 32
    /// bits are used; if additionally a 16-bit hole sits at offset 1, no
    /// more than 16 bits are, and so on down.
    pub fn first_word_used(&self) -> u32 {
        for i in (0..self.holes.len()).rev() {
            if self.holes[i] != 1 {
                return i as u32 + 1;
            }
        }
        0
    }
}

/// Identifies a field-bearing scope: the struct itself or one of its groups.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScopeId {
    Top,
    Group(GroupId),
}

/// Index of a union scope within a [`StructLayout`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct UnionId(pub u32);

impl UnionId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a group scope within a [`StructLayout`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct GroupId(pub u32);

impl GroupId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Root allocator state for one struct.
#[derive(Debug, Default)]
pub struct Top {
    /// Size of the data section so far, in 64-bit words.
    pub data_words: u32,
    /// Size of the pointer section so far, in slots.
    pub pointers: u32,
    pub holes: HoleSet,
}

/// One contiguous data region reserved by a union; every variant may reuse
/// it. `offset` is a multiple of the location's own size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataLocation {
    pub lg_size: u32,
    pub offset: u32,
}

/// A union's layout state. Lives under a top or group scope, never under
/// another union.
#[derive(Debug)]
pub struct UnionScope {
    parent: ScopeId,
    group_count: u32,
    /// Position of the 16-bit tag, as a multiple of 16 bits, once placed.
    pub discriminant_offset: Option<u32>,
    data_locations: Vec<DataLocation>,
    pointer_locations: Vec<u32>,
}

/// How much of one parent [`DataLocation`] a group has consumed.
#[derive(Clone, Copy, Debug, Default)]
struct DataLocationUsage {
    used: Option<LocationUsed>,
}

#[derive(Clone, Copy, Debug)]
struct LocationUsed {
    /// Minimum power-of-two size covering everything allocated here.
    lg_size_used: u32,
    /// Holes inside the used region; offsets are relative to the
    /// location's start, not the struct's.
    holes: HoleSet,
}

impl DataLocationUsage {
    fn fully_used(lg_size: u32) -> Self {
        DataLocationUsage {
            used: Some(LocationUsed {
                lg_size_used: lg_size,
                holes: HoleSet::new(),
            }),
        }
    }

    /// The smallest single hole of at least the given size, used to pick
    /// the allocation spot that fragments the location least. Returns the
    /// hole's lg size.
    fn smallest_hole_at_least(&self, location: DataLocation, lg_size: u32) -> Option<u32> {
        match &self.used {
            None => {
                // The location is one big hole.
                (lg_size <= location.lg_size).then_some(location.lg_size)
            }
            Some(used) if lg_size >= used.lg_size_used => {
                // Too big for any current hole, but doubling the used
                // region would make room if the location allows it.
                (lg_size < location.lg_size).then_some(lg_size)
            }
            Some(used) => {
                if let Some(hole) = used.holes.smallest_at_least(lg_size) {
                    Some(hole)
                } else if used.lg_size_used < location.lg_size {
                    // Doubling the used region creates a hole the same
                    // size as the current usage.
                    Some(used.lg_size_used)
                } else {
                    None
                }
            }
        }
    }

    /// Allocate from the hole `smallest_hole_at_least` found. The returned
    /// offset is relative to the whole data section.
    fn allocate_from_hole(&mut self, location: DataLocation, lg_size: u32) -> u32 {
        let result = match &mut self.used {
            None => {
                debug_assert!(lg_size <= location.lg_size);
                self.used = Some(LocationUsed {
                    lg_size_used: lg_size,
                    holes: HoleSet::new(),
                });
                0
            }
            Some(used) if lg_size >= used.lg_size_used => {
                // Grow usage to double the requested size and hand out the
                // second half.
                debug_assert!(lg_size < location.lg_size);
                used.holes.add_holes_at_end(used.lg_size_used, 1, lg_size);
                used.lg_size_used = lg_size + 1;
                1
            }
            Some(used) => {
                if let Some(hole) = used.holes.try_allocate(lg_size) {
                    hole
                } else {
                    // Double the used region and allocate from the new half.
                    debug_assert!(used.lg_size_used < location.lg_size);
                    let result = 1 << (used.lg_size_used - lg_size);
                    used.holes.add_holes_at_end(lg_size, result + 1, used.lg_size_used);
                    used.lg_size_used += 1;
                    result
                }
            }
        };
        (location.offset << (location.lg_size - lg_size)) + result
    }
}

/// One variant of a union. Allocations fall back to the parent union's
/// storage; the group only tracks which parts of it this variant uses.
#[derive(Debug)]
pub struct GroupScope {
    parent: UnionId,
    /// Parallel to the parent union's data locations.
    usages: Vec<DataLocationUsage>,
    /// How many of the parent's pointer slots this group has consumed.
    parent_pointer_usage: usize,
    has_members: bool,
}

/// The whole scope tree for one struct translation.
#[derive(Debug, Default)]
pub struct StructLayout {
    top: Top,
    unions: Vec<UnionScope>,
    groups: Vec<GroupScope>,
}

impl StructLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn top(&self) -> &Top {
        &self.top
    }

    pub fn union(&self, u: UnionId) -> &UnionScope {
        &self.unions[u.index()]
    }

    pub fn new_union(&mut self, parent: ScopeId) -> UnionId {
        self.unions.push(UnionScope {
            parent,
            group_count: 0,
            discriminant_offset: None,
            data_locations: Vec::new(),
            pointer_locations: Vec::new(),
        });
        UnionId(self.unions.len() as u32 - 1)
    }

    pub fn new_group(&mut self, parent: UnionId) -> GroupId {
        self.groups.push(GroupScope {
            parent,
            usages: Vec::new(),
            parent_pointer_usage: 0,
            has_members: false,
        });
        GroupId(self.groups.len() as u32 - 1)
    }

    /// Record a void field. Costs nothing, but still marks group membership
    /// so the union's discriminant accounting sees the variant.
    pub fn add_void(&mut self, scope: ScopeId) {
        match scope {
            ScopeId::Top => {}
            ScopeId::Group(g) => self.group_add_void(g),
        }
    }

    /// Allocate a 2^lg_size-bit data field, returning its offset as a
    /// multiple of its own size.
    pub fn add_data(&mut self, scope: ScopeId, lg_size: u32) -> u32 {
        match scope {
            ScopeId::Top => self.top_add_data(lg_size),
            ScopeId::Group(g) => self.group_add_data(g, lg_size),
        }
    }

    /// Allocate one pointer slot, returning its index.
    pub fn add_pointer(&mut self, scope: ScopeId) -> u32 {
        match scope {
            ScopeId::Top => {
                let slot = self.top.pointers;
                self.top.pointers += 1;
                slot
            }
            ScopeId::Group(g) => self.group_add_pointer(g),
        }
    }

    /// Try to grow previously allocated space by a factor of 2^expansion.
    /// Succeeds only if the space after it happens to be free.
    pub fn try_expand_data(
        &mut self,
        scope: ScopeId,
        old_lg_size: u32,
        old_offset: u32,
        expansion: u32,
    ) -> bool {
        match scope {
            ScopeId::Top => self.top.holes.try_expand(old_lg_size, old_offset, expansion),
            ScopeId::Group(g) => self.group_try_expand_data(g, old_lg_size, old_offset, expansion),
        }
    }

    fn top_add_data(&mut self, lg_size: u32) -> u32 {
        if let Some(hole) = self.top.holes.try_allocate(lg_size) {
            hole
        } else {
            let offset = self.top.data_words << (6 - lg_size);
            self.top.data_words += 1;
            self.top.holes.add_holes_at_end(lg_size, offset + 1, 6);
            offset
        }
    }

    // ---- union operations ----

    /// Reserve a whole new data location in the union's parent.
    pub fn union_add_new_data_location(&mut self, u: UnionId, lg_size: u32) -> u32 {
        let parent = self.unions[u.index()].parent;
        let offset = self.add_data(parent, lg_size);
        self.unions[u.index()]
            .data_locations
            .push(DataLocation { lg_size, offset });
        offset
    }

    /// Reserve a whole new pointer location in the union's parent.
    pub fn union_add_new_pointer_location(&mut self, u: UnionId) -> u32 {
        let parent = self.unions[u.index()].parent;
        let slot = self.add_pointer(parent);
        self.unions[u.index()].pointer_locations.push(slot);
        slot
    }

    /// Place the union's 16-bit discriminant in the parent scope. Returns
    /// false if it had already been placed.
    pub fn union_add_discriminant(&mut self, u: UnionId) -> bool {
        if self.unions[u.index()].discriminant_offset.is_some() {
            return false;
        }
        let parent = self.unions[u.index()].parent;
        let offset = self.add_data(parent, 4);
        self.unions[u.index()].discriminant_offset = Some(offset);
        true
    }

    fn union_new_group_adding_first_member(&mut self, u: UnionId) {
        self.unions[u.index()].group_count += 1;
        if self.unions[u.index()].group_count == 2 {
            self.union_add_discriminant(u);
        }
    }

    /// Grow a union data location to 2^new_lg_size, rescaling its offset.
    fn location_try_expand_to(&mut self, u: UnionId, index: usize, new_lg_size: u32) -> bool {
        let location = self.unions[u.index()].data_locations[index];
        if new_lg_size <= location.lg_size {
            return true;
        }
        let parent = self.unions[u.index()].parent;
        let expansion = new_lg_size - location.lg_size;
        if self.try_expand_data(parent, location.lg_size, location.offset, expansion) {
            let location = &mut self.unions[u.index()].data_locations[index];
            location.offset >>= expansion;
            location.lg_size = new_lg_size;
            true
        } else {
            false
        }
    }

    // ---- group operations ----

    fn group_add_void(&mut self, g: GroupId) {
        if !self.groups[g.index()].has_members {
            self.groups[g.index()].has_members = true;
            let parent = self.groups[g.index()].parent;
            self.union_new_group_adding_first_member(parent);
        }
    }

    fn group_add_data(&mut self, g: GroupId, lg_size: u32) -> u32 {
        self.group_add_void(g);
        let parent = self.groups[g.index()].parent;

        // Bring the usage vector up to date with the union's locations,
        // then score every location by the smallest hole that could take
        // the field. Best fit keeps large holes intact for future wide
        // fields; ties go to the first location found.
        let location_count = self.unions[parent.index()].data_locations.len();
        self.groups[g.index()]
            .usages
            .resize_with(location_count, DataLocationUsage::default);

        let mut best: Option<(usize, u32)> = None;
        for i in 0..location_count {
            let location = self.unions[parent.index()].data_locations[i];
            let usage = &self.groups[g.index()].usages[i];
            if let Some(hole) = usage.smallest_hole_at_least(location, lg_size)
                && best.is_none_or(|(_, best_size)| hole < best_size)
            {
                best = Some((i, hole));
            }
        }

        if let Some((i, _)) = best {
            let location = self.unions[parent.index()].data_locations[i];
            return self.groups[g.index()].usages[i].allocate_from_hole(location, lg_size);
        }

        // No hole anywhere was big enough. Try expanding each location in
        // place to make room.
        for i in 0..location_count {
            if let Some(result) = self.group_try_allocate_by_expanding(g, i, lg_size) {
                return result;
            }
        }

        // Still nothing: reserve a brand-new location sized for this field.
        let result = self.union_add_new_data_location(parent, lg_size);
        self.groups[g.index()]
            .usages
            .push(DataLocationUsage::fully_used(lg_size));
        result
    }

    fn group_add_pointer(&mut self, g: GroupId) -> u32 {
        self.group_add_void(g);
        let parent = self.groups[g.index()].parent;
        let used = self.groups[g.index()].parent_pointer_usage;
        self.groups[g.index()].parent_pointer_usage += 1;
        if used < self.unions[parent.index()].pointer_locations.len() {
            self.unions[parent.index()].pointer_locations[used]
        } else {
            self.union_add_new_pointer_location(parent)
        }
    }

    /// Grow an unused location to fit, or grow the used region by one and
    /// allocate from the new upper half.
    fn group_try_allocate_by_expanding(
        &mut self,
        g: GroupId,
        index: usize,
        lg_size: u32,
    ) -> Option<u32> {
        let parent = self.groups[g.index()].parent;
        match self.groups[g.index()].usages[index].used {
            None => {
                if self.location_try_expand_to(parent, index, lg_size) {
                    let location = self.unions[parent.index()].data_locations[index];
                    self.groups[g.index()].usages[index] = DataLocationUsage::fully_used(lg_size);
                    Some(location.offset << (location.lg_size - lg_size))
                } else {
                    None
                }
            }
            Some(used) => {
                let desired = used.lg_size_used.max(lg_size) + 1;
                if self.group_try_expand_usage(g, index, desired) {
                    let usage = &mut self.groups[g.index()].usages[index];
                    let used = usage.used.as_mut().expect("usage checked above");
                    let hole = used
                        .holes
                        .try_allocate(lg_size)
                        .expect("expanded usage leaves a hole of the requested size");
                    let location = self.unions[parent.index()].data_locations[index];
                    Some((location.offset << (location.lg_size - lg_size)) + hole)
                } else {
                    None
                }
            }
        }
    }

    /// Grow a group's used region within one location to 2^desired bits,
    /// growing the location itself first if needed. New space is recorded
    /// as holes.
    fn group_try_expand_usage(&mut self, g: GroupId, index: usize, desired: u32) -> bool {
        let parent = self.groups[g.index()].parent;
        let location = self.unions[parent.index()].data_locations[index];
        if desired > location.lg_size && !self.location_try_expand_to(parent, index, desired) {
            return false;
        }
        let usage = &mut self.groups[g.index()].usages[index];
        let used = usage.used.as_mut().expect("cannot expand unused location");
        used.holes.add_holes_at_end(used.lg_size_used, 1, desired);
        used.lg_size_used = desired;
        true
    }

    fn group_try_expand_data(
        &mut self,
        g: GroupId,
        old_lg_size: u32,
        old_offset: u32,
        expansion: u32,
    ) -> bool {
        if old_lg_size + expansion > 6 || old_offset & ((1 << expansion) - 1) != 0 {
            // New size too large, or the offset is not aligned to it.
            return false;
        }

        let parent = self.groups[g.index()].parent;
        for i in 0..self.groups[g.index()].usages.len() {
            let location = self.unions[parent.index()].data_locations[i];
            if location.lg_size >= old_lg_size
                && old_offset >> (location.lg_size - old_lg_size) == location.offset
            {
                // The region to expand lives inside this location; make the
                // offset local before delegating.
                let local_offset =
                    old_offset - (location.offset << (location.lg_size - old_lg_size));
                return self.group_usage_try_expand(g, i, old_lg_size, local_offset, expansion);
            }
        }

        panic!("tried to expand a field that was never allocated");
    }

    fn group_usage_try_expand(
        &mut self,
        g: GroupId,
        index: usize,
        old_lg_size: u32,
        old_offset: u32,
        expansion: u32,
    ) -> bool {
        let usage = self.groups[g.index()].usages[index];
        match usage.used {
            Some(used) if old_offset == 0 && used.lg_size_used == old_lg_size => {
                // The used region is exactly the expanding data: grow the
                // whole thing. The new space belongs to the data, so no
                // holes appear.
                let parent = self.groups[g.index()].parent;
                let desired = old_lg_size + expansion;
                let location = self.unions[parent.index()].data_locations[index];
                if desired > location.lg_size
                    && !self.location_try_expand_to(parent, index, desired)
                {
                    return false;
                }
                let usage = &mut self.groups[g.index()].usages[index];
                let used = usage.used.as_mut().expect("usage checked above");
                used.lg_size_used = desired;
                true
            }
            Some(_) => {
                // The used region holds other data too, so the expansion
                // can only swallow recorded holes.
                let usage = &mut self.groups[g.index()].usages[index];
                let used = usage.used.as_mut().expect("usage checked above");
                used.holes.try_expand(old_lg_size, old_offset, expansion)
            }
            None => false,
        }
    }
}
