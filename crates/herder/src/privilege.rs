//! Permanent identity switching for daemons started with `--user`.

use std::ffi::CString;

use log::{debug, info};
use nix::errno::Errno;
use nix::unistd::{Gid, Group, Uid, User};

use crate::error::HerderError;

/// System calls used to switch identity. Abstracted so the ordering and the
/// verification step can be exercised without real privileges.
pub trait Identity {
  /// Look up `(uid, gid)` for a user name; `Ok(None)` when the user is unknown.
  fn lookup_user(&self, name: &str) -> nix::Result<Option<(Uid, Gid)>>;
  /// Replace the supplementary groups with those of `user`.
  fn init_groups(&mut self, user: &str, gid: Gid) -> nix::Result<()>;
  fn set_gid(&mut self, gid: Gid) -> nix::Result<()>;
  fn set_uid(&mut self, uid: Uid) -> nix::Result<()>;
}

/// The real process identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemIdentity;

impl Identity for SystemIdentity {
  fn lookup_user(&self, name: &str) -> nix::Result<Option<(Uid, Gid)>> {
    Ok(User::from_name(name)?.map(|u| (u.uid, u.gid)))
  }

  fn init_groups(&mut self, user: &str, gid: Gid) -> nix::Result<()> {
    let name = CString::new(user).map_err(|_| Errno::EINVAL)?;
    nix::unistd::initgroups(&name, gid)
  }

  fn set_gid(&mut self, gid: Gid) -> nix::Result<()> {
    nix::unistd::setgid(gid)
  }

  fn set_uid(&mut self, uid: Uid) -> nix::Result<()> {
    nix::unistd::setuid(uid)
  }
}

/// Whether the effective uid of this process is root.
#[must_use]
pub fn running_as_root() -> bool {
  nix::unistd::geteuid().is_root()
}

/// `user:group` names of the effective identity, falling back to numeric ids.
#[must_use]
pub fn effective_identity() -> String {
  let uid = nix::unistd::geteuid();
  let gid = nix::unistd::getegid();
  let user = User::from_uid(uid)
    .ok()
    .flatten()
    .map_or_else(|| uid.to_string(), |u| u.name);
  let group = Group::from_gid(gid)
    .ok()
    .flatten()
    .map_or_else(|| gid.to_string(), |g| g.name);
  format!("{user}:{group}")
}

/// Permanently become `user` using the real process identity.
///
/// # Errors
/// [`HerderError::Privilege`] as described on [`switch_to_with`].
pub fn switch_to(user: &str) -> Result<(), HerderError> {
  switch_to_with(&mut SystemIdentity, user)
}

/// Permanently become `user`: supplementary groups, then group, then user.
///
/// Unless the target is root itself, regaining uid 0 afterwards must fail with
/// `EPERM`; anything else means the switch can be undone.
///
/// # Errors
/// [`HerderError::Privilege`] when the user is unknown, a set call fails, or root
/// can still be reacquired.
pub fn switch_to_with<I: Identity>(ids: &mut I, user: &str) -> Result<(), HerderError> {
  let (uid, gid) = ids
    .lookup_user(user)
    .map_err(|e| HerderError::Privilege(format!("failed to look up user '{user}': {e}")))?
    .ok_or_else(|| HerderError::Privilege(format!("unknown user '{user}'")))?;

  match ids.init_groups(user, gid) {
    Ok(()) => {}
    // Unprivileged callers keep their groups; the set calls below decide.
    Err(Errno::EPERM) => debug!("not permitted to reset supplementary groups for {user}"),
    Err(e) => {
      return Err(HerderError::Privilege(format!(
        "failed to set supplementary groups for '{user}': {e}"
      )));
    }
  }
  ids
    .set_gid(gid)
    .map_err(|e| HerderError::Privilege(format!("failed to set group id {gid}: {e}")))?;
  ids
    .set_uid(uid)
    .map_err(|e| HerderError::Privilege(format!("failed to set user id {uid}: {e}")))?;

  if !uid.is_root() {
    ensure_permanently_switched(ids)?;
  }
  info!("switched identity to {user} (uid {uid}, gid {gid})");
  Ok(())
}

fn ensure_permanently_switched<I: Identity>(ids: &mut I) -> Result<(), HerderError> {
  match ids.set_uid(Uid::from_raw(0)) {
    Err(Errno::EPERM) => Ok(()),
    Ok(()) => Err(HerderError::Privilege(
      "privileges not permanently dropped".to_string(),
    )),
    Err(e) => Err(HerderError::Privilege(format!(
      "failed to verify dropped privileges: {e}"
    ))),
  }
}
