//! ALT 生命周期与转账所需的指令构造。

use solana_address_lookup_table_interface::instruction as alt_instruction;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_system_interface::instruction as system_instruction;

/// 创建空 ALT，付款方与权限方均为钱包本身；返回指令与派生出的 ALT 地址。
pub fn create_table(authority: &Pubkey, recent_slot: u64) -> (Instruction, Pubkey) {
    alt_instruction::create_lookup_table(*authority, *authority, recent_slot)
}

pub fn extend_table(table: &Pubkey, authority: &Pubkey, addresses: Vec<Pubkey>) -> Instruction {
    alt_instruction::extend_lookup_table(*table, *authority, Some(*authority), addresses)
}

pub fn deactivate_table(table: &Pubkey, authority: &Pubkey) -> Instruction {
    alt_instruction::deactivate_lookup_table(*table, *authority)
}

/// 关闭 ALT 并把租金退回钱包。
pub fn close_table(table: &Pubkey, authority: &Pubkey) -> Instruction {
    alt_instruction::close_lookup_table(*table, *authority, *authority)
}

pub fn transfer(from: &Pubkey, to: &Pubkey, lamports: u64) -> Instruction {
    system_instruction::transfer(from, to, lamports)
}
