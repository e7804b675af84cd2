pub mod group;
pub mod group_grant;
pub mod group_member;
pub mod permission;
pub mod user;
pub mod user_grant;

pub use group::Entity as Group;
pub use group_grant::Entity as GroupGrant;
pub use group_member::Entity as GroupMember;
pub use permission::Entity as Permission;
pub use user::Entity as User;
pub use user_grant::Entity as UserGrant;
