//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into board commands.
//! - Own every write transaction boundary and every authorization check.
//!
//! # Invariants
//! - Preconditions are checked inside the command transaction, before the
//!   first mutation; a failed check leaves the store untouched.
//! - Key exhaustion is recovered by renumbering once inside the same
//!   transaction; only a container that is still exhausted afterwards
//!   reports `Ordering`.

use crate::model::board::{ActorId, BoardId, BoardRole};
use crate::ordering::{KeySpace, OrderKey};
use crate::repo::container_repo::{ContainerRef, OrderedContainerRepository};
use crate::repo::member_repo::BoardAuthorizer;
use log::warn;

pub mod board_service;
pub mod error;
pub mod move_service;
pub mod reorder_service;
pub mod template_service;

pub use error::{ServiceError, ServiceResult};

/// Fails with `PermissionDenied` unless the actor holds `required` on the
/// board.
pub(crate) fn require_role<A: BoardAuthorizer>(
    authorizer: &A,
    actor: ActorId,
    board: BoardId,
    required: BoardRole,
) -> ServiceResult<()> {
    if authorizer.has_role(actor, board, required)? {
        return Ok(());
    }
    warn!(
        "event=authorization_denied module=service status=error required_role={} board={}",
        required.as_str(),
        board
    );
    Err(ServiceError::PermissionDenied { actor, board })
}

/// Returns a key after every member of `container`, renumbering the
/// container once if its key range is exhausted.
pub(crate) fn append_key_with_recovery<R: OrderedContainerRepository>(
    containers: &R,
    container: ContainerRef,
    key_space: &KeySpace,
) -> ServiceResult<OrderKey> {
    let keys = member_keys(containers, container)?;
    match key_space.append_key(&keys) {
        Ok(key) => Ok(key),
        Err(err) if err.is_exhausted() => {
            renumber_for_recovery(containers, container, key_space)?;
            let keys = member_keys(containers, container)?;
            Ok(key_space.append_key(&keys)?)
        }
        Err(err) => Err(err.into()),
    }
}

/// Keys of every member (archived included) in rendering order.
pub(crate) fn member_keys<R: OrderedContainerRepository>(
    containers: &R,
    container: ContainerRef,
) -> ServiceResult<Vec<OrderKey>> {
    Ok(containers
        .list_ordered(container, true)?
        .into_iter()
        .map(|entry| entry.position)
        .collect())
}

pub(crate) fn renumber_for_recovery<R: OrderedContainerRepository>(
    containers: &R,
    container: ContainerRef,
    key_space: &KeySpace,
) -> ServiceResult<usize> {
    let count = containers.renumber(container, key_space)?;
    warn!(
        "event=key_space_recovered module=service status=ok container_kind={} container={} count={}",
        container.kind(),
        container.id(),
        count
    );
    Ok(count)
}
