//! Interface identifiers
//!
//! These must match the values in the Windows SDK headers exactly.

use crate::com::Guid;

pub const IID_IUNKNOWN: Guid = Guid::from_u128(0x00000000_0000_0000_c000_000000000046);

// d3d11.h
pub const IID_ID3D11_DEVICE: Guid = Guid::from_u128(0xdb6f6ddb_ac77_4e88_8253_819df9bbf140);
pub const IID_ID3D11_DEVICE_CONTEXT: Guid = Guid::from_u128(0xc0bfa96c_e089_44fb_8eaf_26f8796190da);
pub const IID_ID3D11_TEXTURE2D: Guid = Guid::from_u128(0x6f15aaf2_d208_4e89_9ab4_489535d34f9c);

// dxgi.h through dxgi1_6.h
pub const IID_IDXGI_DEVICE: Guid = Guid::from_u128(0x54ec77fa_1377_44e6_8c32_88fd5f44c84c);
pub const IID_IDXGI_DEVICE1: Guid = Guid::from_u128(0x77db970f_6276_48ba_ba28_070143b4392c);
pub const IID_IDXGI_DEVICE2: Guid = Guid::from_u128(0x05008617_fbfd_4051_a790_144884b4f6a9);

pub const IID_IDXGI_ADAPTER: Guid = Guid::from_u128(0x2411e7e1_12ac_4ccf_bd14_9798e8534dc0);
pub const IID_IDXGI_ADAPTER1: Guid = Guid::from_u128(0x29038f61_3839_4626_91fd_086879011a05);

pub const IID_IDXGI_FACTORY: Guid = Guid::from_u128(0x7b7166ec_21c7_44ae_b21a_c9ae321ae369);
pub const IID_IDXGI_FACTORY1: Guid = Guid::from_u128(0x770aae78_f26f_4dba_a829_253c83d1b387);
pub const IID_IDXGI_FACTORY2: Guid = Guid::from_u128(0x50c83a1c_e072_4c48_87b0_3630fa36a6d0);
pub const IID_IDXGI_FACTORY3: Guid = Guid::from_u128(0x25483823_cd46_4c7d_86ca_47aa95b837bd);
pub const IID_IDXGI_FACTORY4: Guid = Guid::from_u128(0x1bc6ea02_ef36_464f_bf0c_21ca39e5168a);
pub const IID_IDXGI_FACTORY5: Guid = Guid::from_u128(0x7632e1f5_ee65_4dca_87fd_84cd75f8838d);
pub const IID_IDXGI_FACTORY6: Guid = Guid::from_u128(0xc1b6694f_ff09_44a9_b03c_77900a0a1d17);
pub const IID_IDXGI_FACTORY7: Guid = Guid::from_u128(0xa4966eed_76db_44da_84c1_ee9a7afb20a8);

pub const IID_IDXGI_SWAP_CHAIN: Guid = Guid::from_u128(0x310d36a0_d2e7_4c0a_aa04_6a9d23b8886a);
pub const IID_IDXGI_SWAP_CHAIN1: Guid = Guid::from_u128(0x790a45f7_0d42_4876_983a_0a55cfe6f4aa);
pub const IID_IDXGI_SWAP_CHAIN2: Guid = Guid::from_u128(0xa8be2ac4_199f_4946_b331_79599fb98de7);

pub const IID_IDXGI_RESOURCE: Guid = Guid::from_u128(0x035f3ab4_482e_4e50_b41f_8a7f8bd8960b);
