//! Multi-component views.
//!
//! A view iterates every entity holding all of the requested component
//! types, yielding `(EntityId, (&C1, &C2, ...))` per entity. Iteration
//! drives the smallest of the requested storages and probes the others, so
//! the work is bounded by the sparsest component set -- a "Terrain" held by
//! one entity keeps a `view::<(&Transform, &Terrain)>()` cheap even when
//! thousands of entities hold a Transform.
//!
//! ## Soundness
//!
//! Read-only views (`&T`) use [`ComponentManager::view`] which takes
//! `&self`. Mutable views (`&mut T`) use [`ComponentManager::view_mut`]
//! which takes `&mut self`, guaranteeing exclusive access and preventing
//! aliasing UB. Because a live view pins that borrow, structural mutation
//! of the storages mid-iteration is rejected at compile time -- the iteration
//! order captured at view creation stays valid for the view's lifetime.

use crate::component::ComponentTypeId;
use crate::entity::EntityId;
use crate::manager::ComponentManager;

// ---------------------------------------------------------------------------
// ViewItem trait -- one element of a view tuple
// ---------------------------------------------------------------------------

/// A single element of a view fetch: `&T` (read) or `&mut T` (write).
pub trait ViewItem {
    /// The reference type yielded per entity.
    type Item<'w>;
    /// Whether this item borrows mutably.
    const MUTABLE: bool;
    /// The component type this item reads or writes.
    fn component_type_id(components: &ComponentManager) -> Option<ComponentTypeId>;
    /// Fetch this item for one entity, or `None` if the entity lacks it.
    fn fetch(components: &ComponentManager, entity: EntityId) -> Option<Self::Item<'_>>;
}

impl<T: 'static> ViewItem for &T {
    type Item<'w> = &'w T;
    const MUTABLE: bool = false;

    fn component_type_id(components: &ComponentManager) -> Option<ComponentTypeId> {
        components.types().lookup::<T>()
    }

    fn fetch(components: &ComponentManager, entity: EntityId) -> Option<Self::Item<'_>> {
        components.storage::<T>()?.try_get(entity)
    }
}

// Safety: only reachable through `ComponentManager::view_mut`, whose
// `&mut self` receiver guarantees exclusive access to every storage. The
// cast from `*const` to `*mut` is sound because no other references can
// exist while the view borrow is live, and `validate_access` rejects the
// same component type appearing twice with a mutable item.
impl<T: 'static> ViewItem for &mut T {
    type Item<'w> = &'w mut T;
    const MUTABLE: bool = true;

    fn component_type_id(components: &ComponentManager) -> Option<ComponentTypeId> {
        components.types().lookup::<T>()
    }

    fn fetch(components: &ComponentManager, entity: EntityId) -> Option<Self::Item<'_>> {
        #[allow(unsafe_code)]
        unsafe {
            let components = components as *const ComponentManager as *mut ComponentManager;
            (*components).storage_mut::<T>()?.try_get_mut(entity)
        }
    }
}

// ---------------------------------------------------------------------------
// View trait -- a tuple of ViewItems
// ---------------------------------------------------------------------------

/// A tuple of view items: `(&A, &B)`, `(&mut A, &B)`, and so on.
pub trait View {
    /// The per-entity output tuple.
    type Item<'w>;
    /// Whether any item borrows mutably.
    const HAS_MUTABLE: bool;
    /// The component type ids this view requires, or `None` if any type is
    /// unregistered (such a view matches nothing).
    fn type_ids(components: &ComponentManager) -> Option<Vec<ComponentTypeId>>;
    /// Panic if the same component type is accessed mutably more than once,
    /// or both mutably and immutably.
    fn validate_access(components: &ComponentManager);
    /// Fetch the full tuple for one entity, or `None` if any item is absent.
    fn fetch_row(components: &ComponentManager, entity: EntityId) -> Option<Self::Item<'_>>;
}

/// Shared conflict check for the wider tuple impls.
fn validate_no_access_conflicts(items: &[(bool, Option<ComponentTypeId>)]) {
    let mut mutable_ids: Vec<ComponentTypeId> = Vec::new();
    let mut read_ids: Vec<ComponentTypeId> = Vec::new();
    for &(is_mutable, type_id) in items {
        let Some(id) = type_id else { continue };
        if is_mutable {
            if mutable_ids.contains(&id) {
                panic!("view contains duplicate mutable access to the same component type");
            }
            if read_ids.contains(&id) {
                panic!("view contains overlapping read and mutable access to the same component type");
            }
            mutable_ids.push(id);
        } else {
            if mutable_ids.contains(&id) {
                panic!("view contains overlapping read and mutable access to the same component type");
            }
            read_ids.push(id);
        }
    }
}

impl<A: ViewItem> View for (A,) {
    type Item<'w> = (A::Item<'w>,);
    const HAS_MUTABLE: bool = A::MUTABLE;

    fn type_ids(components: &ComponentManager) -> Option<Vec<ComponentTypeId>> {
        Some(vec![A::component_type_id(components)?])
    }

    fn validate_access(_components: &ComponentManager) {
        // Single item -- no conflicts possible.
    }

    fn fetch_row(components: &ComponentManager, entity: EntityId) -> Option<Self::Item<'_>> {
        Some((A::fetch(components, entity)?,))
    }
}

impl<A: ViewItem, B: ViewItem> View for (A, B) {
    type Item<'w> = (A::Item<'w>, B::Item<'w>);
    const HAS_MUTABLE: bool = A::MUTABLE || B::MUTABLE;

    fn type_ids(components: &ComponentManager) -> Option<Vec<ComponentTypeId>> {
        Some(vec![
            A::component_type_id(components)?,
            B::component_type_id(components)?,
        ])
    }

    fn validate_access(components: &ComponentManager) {
        let items = [
            (A::MUTABLE, A::component_type_id(components)),
            (B::MUTABLE, B::component_type_id(components)),
        ];
        validate_no_access_conflicts(&items);
    }

    fn fetch_row(components: &ComponentManager, entity: EntityId) -> Option<Self::Item<'_>> {
        Some((A::fetch(components, entity)?, B::fetch(components, entity)?))
    }
}

impl<A: ViewItem, B: ViewItem, C: ViewItem> View for (A, B, C) {
    type Item<'w> = (A::Item<'w>, B::Item<'w>, C::Item<'w>);
    const HAS_MUTABLE: bool = A::MUTABLE || B::MUTABLE || C::MUTABLE;

    fn type_ids(components: &ComponentManager) -> Option<Vec<ComponentTypeId>> {
        Some(vec![
            A::component_type_id(components)?,
            B::component_type_id(components)?,
            C::component_type_id(components)?,
        ])
    }

    fn validate_access(components: &ComponentManager) {
        let items = [
            (A::MUTABLE, A::component_type_id(components)),
            (B::MUTABLE, B::component_type_id(components)),
            (C::MUTABLE, C::component_type_id(components)),
        ];
        validate_no_access_conflicts(&items);
    }

    fn fetch_row(components: &ComponentManager, entity: EntityId) -> Option<Self::Item<'_>> {
        Some((
            A::fetch(components, entity)?,
            B::fetch(components, entity)?,
            C::fetch(components, entity)?,
        ))
    }
}

impl<A: ViewItem, B: ViewItem, C: ViewItem, D: ViewItem> View for (A, B, C, D) {
    type Item<'w> = (A::Item<'w>, B::Item<'w>, C::Item<'w>, D::Item<'w>);
    const HAS_MUTABLE: bool = A::MUTABLE || B::MUTABLE || C::MUTABLE || D::MUTABLE;

    fn type_ids(components: &ComponentManager) -> Option<Vec<ComponentTypeId>> {
        Some(vec![
            A::component_type_id(components)?,
            B::component_type_id(components)?,
            C::component_type_id(components)?,
            D::component_type_id(components)?,
        ])
    }

    fn validate_access(components: &ComponentManager) {
        let items = [
            (A::MUTABLE, A::component_type_id(components)),
            (B::MUTABLE, B::component_type_id(components)),
            (C::MUTABLE, C::component_type_id(components)),
            (D::MUTABLE, D::component_type_id(components)),
        ];
        validate_no_access_conflicts(&items);
    }

    fn fetch_row(components: &ComponentManager, entity: EntityId) -> Option<Self::Item<'_>> {
        Some((
            A::fetch(components, entity)?,
            B::fetch(components, entity)?,
            C::fetch(components, entity)?,
            D::fetch(components, entity)?,
        ))
    }
}

// ---------------------------------------------------------------------------
// ViewIter (read-only)
// ---------------------------------------------------------------------------

/// Iterator yielding `(EntityId, V::Item)` for entities holding every
/// requested type. Produced by [`ComponentManager::view`].
pub struct ViewIter<'w, V: View> {
    components: &'w ComponentManager,
    /// Dense entity order of the smallest requested storage, captured when
    /// the view was created.
    entities: Vec<EntityId>,
    cursor: usize,
    _marker: std::marker::PhantomData<V>,
}

impl<'w, V: View> ViewIter<'w, V> {
    pub(crate) fn new(components: &'w ComponentManager, entities: Vec<EntityId>) -> Self {
        Self {
            components,
            entities,
            cursor: 0,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<'w, V: View> Iterator for ViewIter<'w, V> {
    type Item = (EntityId, V::Item<'w>);

    fn next(&mut self) -> Option<Self::Item> {
        let components: &'w ComponentManager = self.components;
        while self.cursor < self.entities.len() {
            let entity = self.entities[self.cursor];
            self.cursor += 1;
            if let Some(item) = V::fetch_row(components, entity) {
                return Some((entity, item));
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// ViewIterMut (mutable)
// ---------------------------------------------------------------------------

/// Iterator yielding `(EntityId, V::Item)` with mutable items. Produced by
/// [`ComponentManager::view_mut`].
///
/// Safety: constructed only from a `&mut ComponentManager` borrow, so the
/// lifetime `'w` carries exclusivity; the mutable fetches inside
/// [`ViewItem`] rely on that.
pub struct ViewIterMut<'w, V: View> {
    components: &'w ComponentManager,
    /// Dense entity order of the smallest requested storage, captured when
    /// the view was created.
    entities: Vec<EntityId>,
    cursor: usize,
    _marker: std::marker::PhantomData<V>,
}

impl<'w, V: View> ViewIterMut<'w, V> {
    pub(crate) fn new(components: &'w ComponentManager, entities: Vec<EntityId>) -> Self {
        Self {
            components,
            entities,
            cursor: 0,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<'w, V: View> Iterator for ViewIterMut<'w, V> {
    type Item = (EntityId, V::Item<'w>);

    fn next(&mut self) -> Option<Self::Item> {
        let components: &'w ComponentManager = self.components;
        while self.cursor < self.entities.len() {
            let entity = self.entities[self.cursor];
            self.cursor += 1;
            if let Some(item) = V::fetch_row(components, entity) {
                return Some((entity, item));
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// ComponentManager view methods
// ---------------------------------------------------------------------------

impl ComponentManager {
    /// The dense entity list of the smallest requested storage.
    fn smallest_entities(&self, type_ids: &[ComponentTypeId]) -> Vec<EntityId> {
        type_ids
            .iter()
            .filter_map(|id| self.erased_storage(*id))
            .min_by_key(|storage| storage.len())
            .map(|storage| storage.entities().to_vec())
            .unwrap_or_default()
    }

    /// Run a read-only view over all entities holding every requested type.
    ///
    /// A view naming an unregistered component type yields nothing.
    ///
    /// # Panics
    ///
    /// Panics if the view contains mutable items (`&mut T`); use
    /// [`view_mut`](Self::view_mut) instead.
    ///
    /// ```ignore
    /// for (entity, (transform, terrain)) in components.view::<(&Transform, &Terrain)>() {
    ///     // ...
    /// }
    /// ```
    pub fn view<V: View>(&self) -> ViewIter<'_, V> {
        assert!(
            !V::HAS_MUTABLE,
            "ComponentManager::view() cannot be used with mutable view items (&mut T). \
             Use ComponentManager::view_mut() instead, which requires &mut self."
        );
        let entities = match V::type_ids(self) {
            Some(type_ids) => self.smallest_entities(&type_ids),
            None => Vec::new(),
        };
        ViewIter::new(self, entities)
    }

    /// Run a view that may mutate components, over all entities holding
    /// every requested type.
    ///
    /// Takes `&mut self` so the mutable item fetches are exclusive.
    ///
    /// # Panics
    ///
    /// Panics if the same component type is named mutably more than once, or
    /// both mutably and immutably.
    ///
    /// ```ignore
    /// for (_entity, (transform, velocity)) in components.view_mut::<(&mut Transform, &Velocity)>() {
    ///     transform.x += velocity.dx;
    /// }
    /// ```
    pub fn view_mut<V: View>(&mut self) -> ViewIterMut<'_, V> {
        V::validate_access(self);
        let entities = match V::type_ids(self) {
            Some(type_ids) => self.smallest_entities(&type_ids),
            None => Vec::new(),
        };
        ViewIterMut::new(self, entities)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
